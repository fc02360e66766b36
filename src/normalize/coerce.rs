use crate::table::Cell;

/// Marks an age bracket the facility does not offer.
pub const CLOSED_GLYPH: &str = "×";
pub const EXTEND_GLYPH: &str = "*";
pub const EMERGENCY_GLYPH: &str = "★";

pub const CLOSED: i64 = -1;

/// Absent → 0, closed glyph → -1, otherwise the integer value or `None`.
pub fn count(cell: Option<&Cell>) -> Option<i64> {
    match cell {
        None => Some(0),
        Some(Cell::Int(i)) => Some(*i),
        Some(Cell::Float(x)) => integral(*x),
        Some(Cell::Text(s)) if s == CLOSED_GLYPH => Some(CLOSED),
        Some(Cell::Text(s)) => parse_int(s),
    }
}

/// Exact glyph match; anything else, including absent, is false.
pub fn marker(cell: Option<&Cell>, glyph: &str) -> bool {
    matches!(cell, Some(Cell::Text(s)) if s == glyph)
}

/// Pass-through text rendering; absent cells become empty strings.
pub fn text(cell: Option<&Cell>) -> String {
    cell.map(|c| c.to_string()).unwrap_or_default()
}

fn parse_int(s: &str) -> Option<i64> {
    let t = s.trim();
    t.parse::<i64>()
        .ok()
        .or_else(|| t.parse::<f64>().ok().and_then(integral))
}

fn integral(x: f64) -> Option<i64> {
    (x.is_finite() && x.fract() == 0.0).then_some(x as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Cell {
        Cell::Text(s.into())
    }

    #[test]
    fn count_three_way() {
        assert_eq!(count(None), Some(0));
        assert_eq!(count(Some(&t("×"))), Some(-1));
        assert_eq!(count(Some(&t("12"))), Some(12));
        assert_eq!(count(Some(&t("若干"))), None);
    }

    #[test]
    fn count_numeric_cells() {
        assert_eq!(count(Some(&Cell::Int(3))), Some(3));
        assert_eq!(count(Some(&Cell::Float(4.0))), Some(4));
        assert_eq!(count(Some(&Cell::Float(2.5))), None);
        assert_eq!(count(Some(&t(" 7 "))), Some(7));
        assert_eq!(count(Some(&t("7.0"))), Some(7));
    }

    #[test]
    fn closed_glyph_must_match_exactly() {
        assert_eq!(count(Some(&t("× "))), None);
        assert_eq!(count(Some(&t("x"))), None);
    }

    #[test]
    fn markers() {
        assert!(marker(Some(&t("*")), EXTEND_GLYPH));
        assert!(marker(Some(&t("★")), EMERGENCY_GLYPH));
        assert!(!marker(Some(&t("☆")), EMERGENCY_GLYPH));
        assert!(!marker(Some(&t("* ")), EXTEND_GLYPH));
        assert!(!marker(None, EXTEND_GLYPH));
        assert!(!marker(Some(&Cell::Int(1)), EXTEND_GLYPH));
    }

    #[test]
    fn text_passthrough() {
        assert_eq!(text(None), "");
        assert_eq!(text(Some(&t("4月1日"))), "4月1日");
        assert_eq!(text(Some(&Cell::Int(42))), "42");
    }
}
