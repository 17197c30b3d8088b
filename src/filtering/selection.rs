use crate::error_handling::types::FilterError;

/// Allowed values for one filter dimension.
///
/// `Only` with an empty list behaves exactly like `All`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection<T> {
    #[default]
    All,
    Only(Vec<T>),
}

impl<T: PartialEq> Selection<T> {
    pub fn only<I: IntoIterator<Item = T>>(values: I) -> Self {
        let values: Vec<T> = values.into_iter().collect();
        if values.is_empty() {
            Selection::All
        } else {
            Selection::Only(values)
        }
    }

    pub fn is_all(&self) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(values) => values.is_empty(),
        }
    }

    pub fn allows(&self, value: &T) -> bool {
        self.allows_any(|candidate| candidate == value)
    }

    /// True when the dimension is unconstrained or any selected value satisfies `test`.
    pub fn allows_any<F>(&self, test: F) -> bool
    where
        F: Fn(&T) -> bool,
    {
        match self {
            Selection::All => true,
            Selection::Only(values) => values.is_empty() || values.iter().any(test),
        }
    }

    pub fn values(&self) -> &[T] {
        match self {
            Selection::All => &[],
            Selection::Only(values) => values,
        }
    }
}

impl<T: PartialEq> Selection<T> {
    /// Parses a comma-separated list. `*` or `all` anywhere selects everything.
    pub fn parse_with<F>(raw: &str, parse: F) -> Result<Self, FilterError>
    where
        F: Fn(&str) -> Result<T, FilterError>,
    {
        let mut values = Vec::new();
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if token == "*" || token.eq_ignore_ascii_case("all") {
                return Ok(Selection::All);
            }
            let value = parse(token)?;
            if !values.contains(&value) {
                values.push(value);
            }
        }
        Ok(Selection::only(values))
    }

    /// Like [`Selection::parse_with`] but treats a missing parameter as `All`.
    pub fn parse_opt<F>(raw: Option<&str>, parse: F) -> Result<Self, FilterError>
    where
        F: Fn(&str) -> Result<T, FilterError>,
    {
        match raw {
            Some(raw) => Self::parse_with(raw, parse),
            None => Ok(Selection::All),
        }
    }
}

pub fn parse_port(raw: &str) -> Result<u16, FilterError> {
    raw.parse::<u16>()
        .map_err(|_| FilterError::BadPort(format!("{:?} is not a port number", raw)))
}

pub fn parse_text(raw: &str) -> Result<String, FilterError> {
    Ok(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Protocol;

    #[test]
    fn test_empty_only_is_all() {
        let sel: Selection<u16> = Selection::only(Vec::new());
        assert_eq!(sel, Selection::All);
        assert!(Selection::<u16>::Only(vec![]).is_all());
        assert!(Selection::<u16>::Only(vec![]).allows(&80));
    }

    #[test]
    fn test_values_combine_with_or() {
        let sel = Selection::only([22u16, 443]);
        assert!(sel.allows(&22));
        assert!(sel.allows(&443));
        assert!(!sel.allows(&80));
    }

    #[test]
    fn test_parse_list_and_select_all() {
        let sel = Selection::parse_with(" 22, 443 ,,22", parse_port).unwrap();
        assert_eq!(sel, Selection::Only(vec![22, 443]));
        assert_eq!(Selection::parse_with("22,*", parse_port).unwrap(), Selection::All);
        assert_eq!(Selection::parse_with("ALL", parse_port).unwrap(), Selection::All);
        assert_eq!(Selection::parse_with("", parse_port).unwrap(), Selection::All);
        assert!(matches!(
            Selection::parse_with("22,http", parse_port),
            Err(FilterError::BadPort(_))
        ));
    }

    #[test]
    fn test_parse_protocols() {
        let sel = Selection::parse_with("tcp,udp", |s| Ok(Protocol::from(s))).unwrap();
        assert_eq!(sel.values(), &[Protocol::TCP, Protocol::UDP]);
        assert_eq!(Selection::parse_opt(None, parse_text).unwrap(), Selection::All);
    }
}
