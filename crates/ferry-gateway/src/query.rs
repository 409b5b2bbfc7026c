//! Query-string binding

use crate::convert::ConvertError;
use crate::double_array::DoubleArray;
use ferry_core::Status;
use thiserror::Error;
use tracing::debug;

/// Query parameters that control the gateway rather than name a field
pub const RESERVED_QUERY_PARAMS: &[&str] = &["alt", "$alt"];

/// Query binding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("too many values for field {field:?}: {values:?}")]
    TooManyValues { field: String, values: Vec<String> },

    #[error("unknown query parameter {0:?}")]
    UnknownField(String),

    #[error("invalid value for field {field:?}: {source}")]
    Convert {
        field: String,
        #[source]
        source: ConvertError,
    },
}

impl From<QueryError> for Status {
    fn from(err: QueryError) -> Self {
        Status::invalid_argument(err.to_string())
    }
}

/// Parsed query: each key once, in first-appearance order, with all of
/// its values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryParams {
    /// Parse an `application/x-www-form-urlencoded` query string
    pub fn parse(query: Option<&str>) -> Self {
        let mut params = QueryParams::default();
        let Some(query) = query else {
            return params;
        };
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match params.entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value.into_owned()),
                None => params
                    .entries
                    .push((key.into_owned(), vec![value.into_owned()])),
            }
        }
        params
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Call messages that accept fields from the query string.
pub trait QueryBind {
    /// Bind `values` to the field at `path` (dotted key split on `.`).
    ///
    /// Returns `Ok(false)` when the message has no such field.
    fn bind_query_field(&mut self, path: &[&str], values: &[String]) -> Result<bool, QueryError>;
}

/// The single value of a non-repeated field
pub fn single<'a>(path: &[&str], values: &'a [String]) -> Result<&'a str, QueryError> {
    match values {
        [value] => Ok(value.as_str()),
        [] => Ok(""),
        _ => Err(QueryError::TooManyValues {
            field: path.join("."),
            values: values.to_vec(),
        }),
    }
}

/// Convert the single value of a non-repeated field
pub fn convert_single<T>(
    path: &[&str],
    values: &[String],
    convert: impl Fn(&str) -> Result<T, ConvertError>,
) -> Result<T, QueryError> {
    convert(single(path, values)?).map_err(|source| QueryError::Convert {
        field: path.join("."),
        source,
    })
}

/// Convert every value of a repeated field
pub fn convert_repeated<T>(
    path: &[&str],
    values: &[String],
    convert: impl Fn(&str) -> Result<T, ConvertError>,
) -> Result<Vec<T>, QueryError> {
    values
        .iter()
        .map(|v| convert(v))
        .collect::<Result<_, _>>()
        .map_err(|source| QueryError::Convert {
            field: path.join("."),
            source,
        })
}

/// Populate `msg` from the query string.
///
/// Keys that `filter` covers (fields bound from the path or body) and
/// reserved control parameters are skipped; keys naming no field are
/// ignored unless `ignore_unknown` is false.
pub fn populate_query_parameters<M: QueryBind>(
    msg: &mut M,
    query: &QueryParams,
    filter: &DoubleArray,
    ignore_unknown: bool,
) -> Result<(), QueryError> {
    for (key, values) in query.iter() {
        if RESERVED_QUERY_PARAMS.contains(&key) {
            continue;
        }
        let path: Vec<&str> = key.split('.').collect();
        if filter.has_common_prefix(path.as_slice()) {
            debug!(key, "query parameter shadowed by path or body");
            continue;
        }
        if !msg.bind_query_field(&path, values)? {
            if !ignore_unknown {
                return Err(QueryError::UnknownField(key.to_string()));
            }
            debug!(key, "ignoring unknown query parameter");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert;

    #[derive(Debug, Default)]
    struct Probe {
        name: String,
        limit: u32,
        tags: Vec<String>,
        nested_flag: bool,
    }

    impl QueryBind for Probe {
        fn bind_query_field(&mut self, path: &[&str], values: &[String]) -> Result<bool, QueryError> {
            match path {
                ["name"] => self.name = convert_single(path, values, convert::string)?,
                ["limit"] => self.limit = convert_single(path, values, convert::uint32)?,
                ["tags"] => self.tags = convert_repeated(path, values, convert::string)?,
                ["nested", "flag"] => self.nested_flag = convert_single(path, values, convert::bool_value)?,
                _ => return Ok(false),
            }
            Ok(true)
        }
    }

    #[test]
    fn test_parse_groups_repeated_keys_in_order() {
        let q = QueryParams::parse(Some("b=1&a=x%20y&b=2&c"));
        assert_eq!(
            q.iter().map(|(k, v)| (k, v.to_vec())).collect::<Vec<_>>(),
            vec![
                ("b", vec!["1".to_string(), "2".to_string()]),
                ("a", vec!["x y".to_string()]),
                ("c", vec![String::new()]),
            ]
        );
        assert_eq!(q.get("b"), Some(&["1".to_string(), "2".to_string()][..]));
        assert_eq!(q.get("missing"), None);
        assert!(QueryParams::parse(None).is_empty());
    }

    #[test]
    fn test_populate_binds_nested_and_repeated() {
        let mut probe = Probe::default();
        let q = QueryParams::parse(Some("name=pw&tags=a&tags=b&nested.flag=true&limit=10"));
        populate_query_parameters(&mut probe, &q, &DoubleArray::default(), true).unwrap();
        assert_eq!(probe.name, "pw");
        assert_eq!(probe.tags, vec!["a", "b"]);
        assert!(probe.nested_flag);
        assert_eq!(probe.limit, 10);
    }

    #[test]
    fn test_filter_skips_bound_fields() {
        let mut probe = Probe {
            name: "from-path".into(),
            ..Default::default()
        };
        let filter = DoubleArray::new(&[&["name"][..]]);
        let q = QueryParams::parse(Some("name=from-query&limit=3"));
        populate_query_parameters(&mut probe, &q, &filter, true).unwrap();
        assert_eq!(probe.name, "from-path");
        assert_eq!(probe.limit, 3);
    }

    #[test]
    fn test_too_many_values_for_singular_field() {
        let mut probe = Probe::default();
        let q = QueryParams::parse(Some("name=a&name=b"));
        let err = populate_query_parameters(&mut probe, &q, &DoubleArray::default(), true).unwrap_err();
        assert!(matches!(err, QueryError::TooManyValues { .. }));
    }

    #[test]
    fn test_unknown_and_reserved_keys() {
        let mut probe = Probe::default();
        let q = QueryParams::parse(Some("alt=json&bogus=1"));
        populate_query_parameters(&mut probe, &q, &DoubleArray::default(), true).unwrap();

        let err = populate_query_parameters(&mut probe, &q, &DoubleArray::default(), false).unwrap_err();
        assert_eq!(err, QueryError::UnknownField("bogus".into()));
    }

    #[test]
    fn test_conversion_failure_names_field() {
        let mut probe = Probe::default();
        let q = QueryParams::parse(Some("limit=ten"));
        let status: Status =
            populate_query_parameters(&mut probe, &q, &DoubleArray::default(), true)
                .unwrap_err()
                .into();
        assert_eq!(status.code(), ferry_core::Code::InvalidArgument);
        assert!(status.message().contains("limit"));
    }
}
