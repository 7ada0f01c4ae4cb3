//! `.poly` 邊界檔解析。
//!
//! 每行以空白分隔：只有一個 token 的行結束目前的環（環為空時忽略，
//! 例如檔頭名稱或最後的 `END`）；兩個 token 的行是一個「經度 緯度」點。
//! 沒有以結束行收尾的最後一個環會被丟棄，與既有資料來源的行為一致。

use crate::domain::model::{BoundaryRing, GeoPoint};
use crate::utils::error::{LocatorError, Result};

/// 座標 token 無法解析時的處理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NumericPolicy {
    /// 無法解析的數值當作 0
    #[default]
    Lenient,
    /// 回傳 `MalformedPolygon`
    Strict,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PolyParser {
    policy: NumericPolicy,
}

impl PolyParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self::with_policy(NumericPolicy::Strict)
    }

    pub fn with_policy(policy: NumericPolicy) -> Self {
        Self { policy }
    }

    pub fn parse(&self, text: &str) -> Result<Vec<BoundaryRing>> {
        let mut rings = Vec::new();
        let mut current: Vec<GeoPoint> = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let tokens: Vec<&str> = line.split_whitespace().collect();

            match tokens.as_slice() {
                [] => continue,
                [_marker] => {
                    if !current.is_empty() {
                        rings.push(BoundaryRing::new(std::mem::take(&mut current)));
                    }
                }
                [x, y, rest @ ..] => {
                    if !rest.is_empty() && self.policy == NumericPolicy::Strict {
                        return Err(LocatorError::MalformedPolygon {
                            line: line_no,
                            token: rest.join(" "),
                        });
                    }
                    let longitude = self.coordinate(x, line_no, 180.0)?;
                    let latitude = self.coordinate(y, line_no, 90.0)?;
                    current.push(GeoPoint {
                        latitude,
                        longitude,
                    });
                }
            }
        }

        if !current.is_empty() {
            tracing::warn!(
                "⚠️ Dropping unterminated trailing ring with {} points",
                current.len()
            );
        }

        tracing::debug!("Parsed {} boundary rings", rings.len());
        Ok(rings)
    }

    fn coordinate(&self, token: &str, line_no: usize, limit: f64) -> Result<f64> {
        // `nan`、`inf` 之類的 token 視同無法解析
        let parsed = token.parse::<f64>().ok().filter(|value| value.is_finite());
        match (parsed, self.policy) {
            (Some(value), NumericPolicy::Lenient) => Ok(value),
            (Some(value), NumericPolicy::Strict) if value.abs() <= limit => Ok(value),
            (None, NumericPolicy::Lenient) => {
                tracing::debug!("Line {}: '{}' is not a number, using 0", line_no, token);
                Ok(0.0)
            }
            _ => Err(LocatorError::MalformedPolygon {
                line: line_no,
                token: token.to_string(),
            }),
        }
    }
}

/// 以寬鬆模式解析
pub fn parse(text: &str) -> Result<Vec<BoundaryRing>> {
    PolyParser::new().parse(text)
}
