//! Sort directives (`"name asc, id desc"`).

use crate::error::{OrmError, OrmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY term over a property name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub property: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(property: &str) -> Self {
        Self {
            property: property.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(property: &str) -> Self {
        Self {
            property: property.to_string(),
            direction: SortDirection::Desc,
        }
    }

    /// Parse a comma-separated list of `"prop [asc|desc]"` terms.
    ///
    /// `model` only labels the error.
    pub fn parse(model: &str, input: &str) -> OrmResult<Vec<Sort>> {
        let mut sorts = Vec::new();
        for term in input.split(',') {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            let mut words = term.split_whitespace();
            let property = words.next().unwrap_or_default();
            let direction = match words.next() {
                None => SortDirection::Asc,
                Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
                Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                Some(d) => {
                    return Err(OrmError::query(
                        model,
                        format!("invalid sort direction `{d}` in `{term}`"),
                    ));
                }
            };
            if words.next().is_some() {
                return Err(OrmError::query(model, format!("invalid sort term `{term}`")));
            }
            sorts.push(Sort {
                property: property.to_string(),
                direction,
            });
        }
        Ok(sorts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lists() {
        assert_eq!(
            Sort::parse("M", "name asc, id DESC,store").unwrap(),
            vec![Sort::asc("name"), Sort::desc("id"), Sort::asc("store")]
        );
    }

    #[test]
    fn rejects_bad_direction() {
        let err = Sort::parse("Product", "name sideways").unwrap_err();
        assert!(err.to_string().contains("sideways"));
        assert!(Sort::parse("Product", "name asc extra").is_err());
    }

    #[test]
    fn empty_input_is_no_sort() {
        assert!(Sort::parse("M", " , ").unwrap().is_empty());
    }
}
