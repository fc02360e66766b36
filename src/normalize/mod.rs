pub mod coerce;
pub mod ident;
pub mod schema;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::table::{self, RawTableFrame};
use coerce::{EMERGENCY_GLYPH, EXTEND_GLYPH};
use schema::AGE_COLUMNS;

/// One facility row, ready for the store. Field names match what downstream
/// consumers read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: String,
    pub list_number: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub can_extend: bool,
    pub name: String,
    pub starts_at: String,
    #[serde(rename = "0_year_old")]
    pub age0: Option<i64>,
    #[serde(rename = "1_year_old")]
    pub age1: Option<i64>,
    #[serde(rename = "2_years_old")]
    pub age2: Option<i64>,
    #[serde(rename = "3_years_old")]
    pub age3: Option<i64>,
    #[serde(rename = "4_years_old")]
    pub age4: Option<i64>,
    #[serde(rename = "5_years_old")]
    pub age5: Option<i64>,
    pub emergency: bool,
    pub address: String,
    pub phone: String,
}

impl NormalizedRecord {
    pub fn ages(&self) -> [Option<i64>; 6] {
        [self.age0, self.age1, self.age2, self.age3, self.age4, self.age5]
    }
}

/// frames → concat → conform → per-row record.
pub fn normalize(frames: &[RawTableFrame]) -> Result<Vec<NormalizedRecord>, SchemaError> {
    let table = schema::conform(table::concat(frames))?;
    (0..table.len()).map(|row| build_record(&table, row)).collect()
}

fn build_record(table: &RawTableFrame, row: usize) -> Result<NormalizedRecord, SchemaError> {
    let cell = |name: &str| table.cell(row, name);

    let list_number = coerce::count(cell("list_number")).ok_or_else(|| {
        SchemaError::InvalidListNumber {
            row,
            value: coerce::text(cell("list_number")),
        }
    })?;
    let [age0, age1, age2, age3, age4, age5] = AGE_COLUMNS.map(|c| coerce::count(cell(c)));

    Ok(NormalizedRecord {
        id: ident::record_id(cell("phone")),
        list_number,
        kind: coerce::text(cell("type")),
        can_extend: coerce::marker(cell("can_extend"), EXTEND_GLYPH),
        name: coerce::text(cell("name")),
        starts_at: coerce::text(cell("starts_at")),
        age0,
        age1,
        age2,
        age3,
        age4,
        age5,
        emergency: coerce::marker(cell("emergency"), EMERGENCY_GLYPH),
        address: coerce::text(cell("address")),
        phone: coerce::text(cell("phone")),
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn headers() -> Vec<String> {
        let mut cols = vec!["Unnamed: 0".to_string(), "Unnamed: 1".to_string()];
        cols.extend(schema::COLUMN_MAP.iter().map(|(src, _)| src.to_string()));
        cols
    }

    fn t(s: &str) -> Option<Cell> {
        Some(Cell::Text(s.into()))
    }

    /// Artifacts, 番号, 種別, (延), 保育所, 開始, 0歳..5歳, 緊急, 所在地, 電話
    fn row(n: i64, ext: &str, ages: [&str; 6], emergency: &str, phone: Option<&str>) -> Vec<Option<Cell>> {
        let mut r = vec![None, None, Some(Cell::Int(n)), t("認可"), t(ext), t("ひまわり保育園"), t("4月1日")];
        r.extend(ages.iter().map(|a| if a.is_empty() { None } else { t(a) }));
        r.push(t(emergency));
        r.push(t("大田区蒲田1-1-1"));
        r.push(phone.and_then(t));
        r
    }

    fn sample() -> Vec<RawTableFrame> {
        let mut page1 = RawTableFrame::new(headers());
        page1.push_row(row(1, "*", ["1", "2", "", "×", "12", "0"], "★", Some("03-1111-2222")));
        let mut page2 = RawTableFrame::new(headers());
        page2.push_row(row(2, "", ["若干", "×", "3", "3", "3", "3"], "", None));
        vec![page1, page2]
    }

    #[test]
    fn normalizes_rows_in_order() {
        let records = normalize(&sample()).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.list_number, 1);
        assert_eq!(first.id, "c2e7ca31-13af-9f8a-a911-af18c6e6aeff");
        assert_eq!(first.kind, "認可");
        assert!(first.can_extend);
        assert!(first.emergency);
        assert_eq!(first.ages(), [Some(1), Some(2), Some(0), Some(-1), Some(12), Some(0)]);
        assert_eq!(first.phone, "03-1111-2222");

        let second = &records[1];
        assert_eq!(second.list_number, 2);
        assert!(!second.can_extend);
        assert!(!second.emergency);
        assert_eq!(second.ages(), [None, Some(-1), Some(3), Some(3), Some(3), Some(3)]);
        assert_eq!(second.id, "a3d2de76-7555-6553-a5f0-8e4c88d2c228");
        assert_eq!(second.phone, "");
    }

    #[test]
    fn rerun_is_identical() {
        let a = serde_json::to_string(&normalize(&sample()).unwrap()).unwrap();
        let b = serde_json::to_string(&normalize(&sample()).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn same_phone_same_id_across_pages() {
        let mut frames = sample();
        frames[1].rows[0][15] = t("03-1111-2222");
        let records = normalize(&frames).unwrap();
        assert_eq!(records[0].id, records[1].id);
        assert_ne!(records[0].list_number, records[1].list_number);
    }

    #[test]
    fn serializes_canonical_field_names() {
        let records = normalize(&sample()).unwrap();
        let json = serde_json::to_value(&records[1]).unwrap();
        assert_eq!(json["type"], "認可");
        assert_eq!(json["0_year_old"], serde_json::Value::Null);
        assert_eq!(json["1_year_old"], -1);
        assert_eq!(json["5_years_old"], 3);
        assert_eq!(json["emergency"], false);
    }

    #[test]
    fn bad_list_number_is_schema_error() {
        let mut frames = sample();
        frames[0].rows[0][2] = t("計");
        assert_eq!(
            normalize(&frames),
            Err(SchemaError::InvalidListNumber { row: 0, value: "計".into() })
        );
    }

    #[test]
    fn missing_column_fails_loudly() {
        let mut frame = RawTableFrame::new(headers().into_iter().filter(|c| c != "緊急").collect());
        frame.push_row(vec![None; 15]);
        assert_eq!(
            normalize(&[frame]),
            Err(SchemaError::MissingColumn("緊急".into()))
        );
    }

    #[test]
    fn no_frames_is_schema_error() {
        assert!(matches!(normalize(&[]), Err(SchemaError::MissingColumn(_))));
    }
}
