use crate::error::SchemaError;
use crate::table::RawTableFrame;

/// Source header → canonical field, in output order.
pub const COLUMN_MAP: &[(&str, &str)] = &[
    ("番号", "list_number"),
    ("種別", "type"),
    ("(延)", "can_extend"),
    ("保育所", "name"),
    ("開始", "starts_at"),
    ("0歳", "0_year_old"),
    ("1歳", "1_year_old"),
    ("2歳", "2_years_old"),
    ("3歳", "3_years_old"),
    ("4歳", "4_years_old"),
    ("5歳", "5_years_old"),
    ("緊急", "emergency"),
    ("所在地", "address"),
    ("電話", "phone"),
];

/// Header-less columns the lattice extractor emits for the leftmost rulings.
pub const ARTIFACT_COLUMNS: &[&str] = &["Unnamed: 0", "Unnamed: 1"];

pub const AGE_COLUMNS: [&str; 6] = [
    "0_year_old",
    "1_year_old",
    "2_years_old",
    "3_years_old",
    "4_years_old",
    "5_years_old",
];

/// Renames source headers, drops artifact columns and checks that exactly
/// the mapped set of columns remains.
pub fn conform(mut frame: RawTableFrame) -> Result<RawTableFrame, SchemaError> {
    for column in frame.columns.iter_mut() {
        if let Some((_, canonical)) = COLUMN_MAP.iter().find(|(src, _)| *src == column.as_str()) {
            *column = canonical.to_string();
        }
    }

    let keep: Vec<bool> = frame
        .columns
        .iter()
        .map(|c| !ARTIFACT_COLUMNS.contains(&c.as_str()))
        .collect();
    if keep.iter().any(|k| !k) {
        frame.columns = retain_flagged(frame.columns, &keep);
        frame.rows = frame
            .rows
            .into_iter()
            .map(|row| retain_flagged(row, &keep))
            .collect();
    }

    if let Some(unexpected) = frame
        .columns
        .iter()
        .find(|c| !COLUMN_MAP.iter().any(|(_, canonical)| *canonical == c.as_str()))
    {
        return Err(SchemaError::UnexpectedColumn(unexpected.clone()));
    }
    for (source, canonical) in COLUMN_MAP {
        if frame.column_index(canonical).is_none() {
            return Err(SchemaError::MissingColumn(source.to_string()));
        }
    }

    Ok(frame)
}

fn retain_flagged<T>(items: Vec<T>, keep: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, k)| k.then_some(item))
        .collect()
}
