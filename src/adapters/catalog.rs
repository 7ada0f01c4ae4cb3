use crate::adapters::ensure_success;
use crate::domain::model::{BoundingBox, CatalogEntry};
use crate::domain::ports::Catalog;
use crate::utils::error::{LocatorError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

const SOURCE: &str = "catalog";

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub api_url: String,
    pub project: String,
    pub table: String,
    pub access_token: Option<String>,
}

/// BigQuery `jobs.query` 上的 Sentinel-2 索引表
#[derive(Debug, Clone)]
pub struct BigQueryCatalog {
    client: Client,
    settings: CatalogSettings,
}

fn string_parameter(name: &str, value: &str) -> Value {
    json!({
        "name": name,
        "parameterType": {"type": "STRING"},
        "parameterValue": {"value": value}
    })
}

fn float_parameter(name: &str, value: f64) -> Value {
    json!({
        "name": name,
        "parameterType": {"type": "FLOAT64"},
        "parameterValue": {"value": value.to_string()}
    })
}

impl BigQueryCatalog {
    pub fn new(client: Client, settings: CatalogSettings) -> Self {
        Self { client, settings }
    }

    pub fn tile_code_query(&self, code_prefix: &str) -> Value {
        let sql = format!(
            "SELECT granule_id, base_url FROM `{}` WHERE mgrs_tile LIKE @prefix",
            self.settings.table
        );
        self.request_body(sql, vec![string_parameter("prefix", &format!("{}%", code_prefix))])
    }

    /// 只選完全落在矩形內的圖塊；跨 180 度經線的矩形接受任一側
    pub fn bounding_box_query(&self, bbox: &BoundingBox) -> Value {
        let longitude_clause = if bbox.crosses_antimeridian() {
            "(west_lon >= @west OR east_lon <= @east)"
        } else {
            "east_lon <= @east AND west_lon >= @west"
        };
        let sql = format!(
            "SELECT granule_id, base_url FROM `{}` \
             WHERE north_lat <= @north AND south_lat >= @south AND {}",
            self.settings.table, longitude_clause
        );
        self.request_body(
            sql,
            vec![
                float_parameter("north", bbox.north),
                float_parameter("south", bbox.south),
                float_parameter("east", bbox.east),
                float_parameter("west", bbox.west),
            ],
        )
    }

    fn request_body(&self, sql: String, parameters: Vec<Value>) -> Value {
        json!({
            "query": sql,
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "queryParameters": parameters
        })
    }

    async fn run_query(&self, body: Value) -> Result<Vec<CatalogEntry>> {
        let url = format!(
            "{}/projects/{}/queries",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.project
        );
        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.settings.access_token {
            request = request.bearer_auth(token);
        }

        let response = ensure_success(SOURCE, request.send().await?).await?;
        let payload: Value = response.json().await?;
        let entries = parse_rows(&payload)?;
        tracing::debug!("Catalog returned {} rows", entries.len());
        Ok(entries)
    }
}

fn parse_rows(payload: &Value) -> Result<Vec<CatalogEntry>> {
    if payload.get("jobComplete").and_then(Value::as_bool) == Some(false) {
        return Err(LocatorError::malformed(SOURCE, "query did not complete"));
    }

    let rows = match payload.get("rows") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(rows)) => rows,
        Some(_) => return Err(LocatorError::malformed(SOURCE, "'rows' is not a list")),
    };

    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let cell = |column: usize| {
                row.get("f")
                    .and_then(|f| f.get(column))
                    .and_then(|c| c.get("v"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };
            match (cell(0), cell(1)) {
                (Some(granule_id), Some(base_url)) => Ok(CatalogEntry {
                    granule_id,
                    base_url,
                }),
                _ => Err(LocatorError::malformed(
                    SOURCE,
                    format!("row {} does not have (granule_id, base_url)", index),
                )),
            }
        })
        .collect()
}

#[async_trait]
impl Catalog for BigQueryCatalog {
    async fn query_by_tile_code(&self, code_prefix: &str) -> Result<Vec<CatalogEntry>> {
        self.run_query(self.tile_code_query(code_prefix)).await
    }

    async fn query_by_bounding_box(&self, bbox: &BoundingBox) -> Result<Vec<CatalogEntry>> {
        self.run_query(self.bounding_box_query(bbox)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> BigQueryCatalog {
        BigQueryCatalog::new(
            Client::new(),
            CatalogSettings {
                api_url: "https://bq.test/v2".to_string(),
                project: "p".to_string(),
                table: "public.sentinel_2_index".to_string(),
                access_token: None,
            },
        )
    }

    #[test]
    fn test_tile_code_query_uses_prefix_parameter() {
        let body = catalog().tile_code_query("10SEG");
        assert_eq!(
            body["query"],
            "SELECT granule_id, base_url FROM `public.sentinel_2_index` WHERE mgrs_tile LIKE @prefix"
        );
        assert_eq!(body["useLegacySql"], false);
        assert_eq!(body["queryParameters"][0]["parameterValue"]["value"], "10SEG%");
    }

    #[test]
    fn test_bounding_box_query() {
        let bbox = BoundingBox::new(-2.89, -6.55, 29.63, 25.93).unwrap();
        let body = catalog().bounding_box_query(&bbox);
        let sql = body["query"].as_str().unwrap();
        assert!(sql.contains("north_lat <= @north AND south_lat >= @south"));
        assert!(sql.contains("east_lon <= @east AND west_lon >= @west"));
        assert_eq!(body["queryParameters"].as_array().unwrap().len(), 4);
        assert_eq!(body["queryParameters"][3]["parameterValue"]["value"], "25.93");

        let pacific = BoundingBox::new(10.0, -10.0, -170.0, 170.0).unwrap();
        let sql = catalog().bounding_box_query(&pacific)["query"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(sql.contains("(west_lon >= @west OR east_lon <= @east)"));
    }

    #[test]
    fn test_parse_rows() {
        let payload = json!({
            "jobComplete": true,
            "rows": [
                {"f": [{"v": "L1C_T10SEG_A1"}, {"v": "gs://bucket/tiles/10/S/EG/a.SAFE"}]},
                {"f": [{"v": "L1C_T10SEG_A2"}, {"v": "gs://bucket/tiles/10/S/EG/b.SAFE"}]}
            ]
        });
        let rows = parse_rows(&payload).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].granule_id, "L1C_T10SEG_A2");
        assert_eq!(rows[1].base_url, "gs://bucket/tiles/10/S/EG/b.SAFE");
    }

    #[test]
    fn test_parse_rows_edge_cases() {
        assert!(parse_rows(&json!({"jobComplete": true})).unwrap().is_empty());
        assert!(parse_rows(&json!({"jobComplete": false})).is_err());
        assert!(parse_rows(&json!({"rows": {"f": []}})).is_err());
        assert!(parse_rows(&json!({"rows": [{"f": [{"v": "only-id"}]}]})).is_err());
    }
}
