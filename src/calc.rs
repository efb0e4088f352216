use crate::grades::Grade;
use crate::record::Record;
use serde::Serialize;

/// Top-performer label reported for an empty roster.
pub const NO_TOP_PERFORMER: &str = "none";

/// Half-up rounding to two decimals: `floor(100*x + 0.5) / 100`.
/// Every GPA the sidecar reports goes through this.
pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

/// Fixed two-digit rendering used for `gpaText` fields.
pub fn format_gpa(gpa: f64) -> String {
    format!("{:.2}", round_off_2_decimals(gpa))
}

/// Mean grade point of the given grades. An empty sequence is 0.00.
pub fn gpa<I>(grades: I) -> f64
where
    I: IntoIterator<Item = Grade>,
{
    let mut total: u32 = 0;
    let mut count: u32 = 0;
    for g in grades {
        total += g.points();
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    round_off_2_decimals(f64::from(total) / f64::from(count))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStats {
    pub count: usize,
    pub average_gpa: f64,
    pub top_name: String,
}

pub fn roster_stats(records: &[Record]) -> RosterStats {
    let Some(first) = records.first() else {
        return RosterStats {
            count: 0,
            average_gpa: 0.0,
            top_name: NO_TOP_PERFORMER.to_string(),
        };
    };

    let mut total = 0.0;
    let mut top = first;
    let mut top_gpa = first.gpa();
    for r in records {
        let g = r.gpa();
        total += g;
        // Strictly greater: the earliest record keeps a tie.
        if g > top_gpa {
            top = r;
            top_gpa = g;
        }
    }

    RosterStats {
        count: records.len(),
        average_gpa: round_off_2_decimals(total / records.len() as f64),
        top_name: top.name.clone(),
    }
}

/// Case-insensitive substring match on the record name, keeping list order.
/// Whitespace around the query is ignored, so a blank query matches all.
pub fn filter_by_name<'a>(records: &'a [Record], query: &str) -> Vec<&'a Record> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return records.iter().collect();
    }
    records
        .iter()
        .filter(|r| r.name.to_lowercase().contains(&q))
        .collect()
}
