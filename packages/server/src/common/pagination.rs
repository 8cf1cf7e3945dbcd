use serde::Deserialize;

use crate::common::EngineError;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Offset pagination arguments for list endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageArgs {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageArgs {
    /// Validate and apply defaults. Limit is clamped to [1, 200].
    pub fn validated(self) -> Result<(i64, i64), EngineError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(EngineError::validation(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err(EngineError::validation("offset must be non-negative"));
        }
        Ok((limit, offset))
    }
}

impl Default for PageArgs {
    fn default() -> Self {
        Self {
            limit: None,
            offset: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_applied() {
        let (limit, offset) = PageArgs::default().validated().unwrap();
        assert_eq!(limit, 50);
        assert_eq!(offset, 0);
    }

    #[test]
    fn rejects_oversized_limit() {
        let args = PageArgs {
            limit: Some(500),
            offset: None,
        };
        assert!(args.validated().is_err());
    }

    #[test]
    fn rejects_negative_offset() {
        let args = PageArgs {
            limit: None,
            offset: Some(-1),
        };
        assert!(args.validated().is_err());
    }
}
