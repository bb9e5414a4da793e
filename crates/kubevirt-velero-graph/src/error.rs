//! Error types for cluster lookups and graph expansion

use std::fmt;

use thiserror::Error;

/// Errors from a single cluster lookup
#[derive(Debug, Error)]
pub enum LookupError {
    /// The object does not exist
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Kubernetes kind
        kind: String,
        /// Namespace searched
        namespace: String,
        /// Object name
        name: String,
    },

    /// The API server could not be reached or rejected the call
    #[error("failed to {operation}: {source}")]
    Kube {
        /// What was being attempted (e.g. "list claims in ns")
        operation: String,
        /// The underlying kube-rs error
        #[source]
        source: kube::Error,
    },

    /// The API server returned an object the typed view cannot represent
    #[error("malformed {kind} {namespace}/{name}: {message}")]
    Malformed {
        /// Kubernetes kind
        kind: String,
        /// Namespace
        namespace: String,
        /// Object name
        name: String,
        /// Conversion failure
        message: String,
    },

    /// The hook was cancelled before the lookup completed
    #[error("lookup cancelled")]
    Cancelled,
}

impl LookupError {
    /// Classify a kube error from a get call, mapping 404 to `NotFound`.
    pub fn from_get(err: kube::Error, kind: &str, namespace: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => Self::NotFound {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            source => Self::Kube {
                operation: format!("get {} {}/{}", kind, namespace, name),
                source,
            },
        }
    }

    /// Wrap a kube error from a list call.
    pub fn from_list(err: kube::Error, what: &str, namespace: &str) -> Self {
        Self::Kube {
            operation: format!("list {} in {}", what, namespace),
            source: err,
        }
    }

    /// Whether the object was simply absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the lookup was abandoned because the hook was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Sum of the lookup failures met while expanding one graph.
///
/// Returned alongside the partial graph; individual errors are kept rather
/// than collapsed into one message.
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<LookupError>,
}

impl AggregateError {
    /// Build from a non-empty list; `None` when there is nothing to report.
    pub fn from_errors(errors: Vec<LookupError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// The individual failures, in the order they happened
    pub fn errors(&self) -> &[LookupError] {
        &self.errors
    }

    /// Whether any of the failures is a cancellation
    pub fn is_cancelled(&self) -> bool {
        self.errors.iter().any(LookupError::is_cancelled)
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.len() == 1 {
            return write!(f, "{}", self.errors[0]);
        }
        write!(f, "{} lookup errors: ", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found(name: &str) -> LookupError {
        LookupError::NotFound {
            kind: "Pod".to_string(),
            namespace: "ns".to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(not_found("p").to_string(), "Pod ns/p not found");
        assert_eq!(LookupError::Cancelled.to_string(), "lookup cancelled");
    }

    #[test]
    fn aggregate_keeps_every_error() {
        assert!(AggregateError::from_errors(vec![]).is_none());

        let single = AggregateError::from_errors(vec![not_found("a")]).unwrap();
        assert_eq!(single.to_string(), "Pod ns/a not found");

        let agg =
            AggregateError::from_errors(vec![not_found("a"), LookupError::Cancelled]).unwrap();
        assert_eq!(agg.errors().len(), 2);
        assert!(agg.is_cancelled());
        assert_eq!(
            agg.to_string(),
            "2 lookup errors: Pod ns/a not found; lookup cancelled"
        );
    }

    #[test]
    fn classification_helpers() {
        assert!(not_found("a").is_not_found());
        assert!(!LookupError::Cancelled.is_not_found());
        assert!(LookupError::Cancelled.is_cancelled());
    }
}
