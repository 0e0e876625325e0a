//! Bonus payment table from psiTurk question data.
//!
//! psiTurk's `questiondata.csv` has no header and three columns:
//! `uniqueid,key,value`, where `uniqueid` is `<workerid>:<assignmentid>`. Rows
//! with key `bonus` become `worker_id,bonus` lines suitable for a bulk bonus
//! upload.

use std::io::{Read, Write};

use serde::Serialize;
use thiserror::Error;

/// Question data key holding the bonus amount.
const BONUS_KEY: &str = "bonus";

/// Errors while building the bonus table.
#[derive(Debug, Error)]
pub enum BonusError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: expected 3 columns, found {found}")]
    MissingColumns { row: usize, found: usize },
    #[error("row {row}: invalid bonus amount '{value}'")]
    InvalidAmount { row: usize, value: String },
}

/// A single participant's bonus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bonus {
    pub worker_id: String,
    /// Amount in the payment currency, rounded to cents.
    pub amount: f64,
}

/// Aggregate figures for the operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BonusSummary {
    pub count: usize,
    pub total: f64,
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Reads bonus rows from question data, in file order.
pub fn read_question_data<R: Read>(reader: R) -> Result<Vec<Bonus>, BonusError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut bonuses = Vec::new();
    for (idx, result) in csv.records().enumerate() {
        let row = idx + 1;
        let record = result?;
        if record.len() < 3 {
            return Err(BonusError::MissingColumns {
                row,
                found: record.len(),
            });
        }
        if &record[1] != BONUS_KEY {
            continue;
        }

        let value = record[2].trim();
        let amount: f64 = value
            .parse()
            .ok()
            .filter(|a: &f64| a.is_finite())
            .ok_or_else(|| BonusError::InvalidAmount {
                row,
                value: value.to_string(),
            })?;
        let worker_id = record[0].split(':').next().unwrap_or_default().to_string();

        bonuses.push(Bonus {
            worker_id,
            amount: round_cents(amount),
        });
    }

    tracing::debug!(count = bonuses.len(), "read bonus rows");
    Ok(bonuses)
}

/// Writes `worker_id,amount` lines without a header.
pub fn write_bonus_csv<W: Write>(writer: W, bonuses: &[Bonus]) -> Result<(), BonusError> {
    let mut csv = csv::Writer::from_writer(writer);
    for bonus in bonuses {
        let amount = format!("{:.2}", bonus.amount);
        csv.write_record([bonus.worker_id.as_str(), amount.as_str()])?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Count, total, mean and median of the bonus amounts.
#[expect(clippy::cast_precision_loss, reason = "participant counts are small")]
pub fn summarize(bonuses: &[Bonus]) -> BonusSummary {
    let mut amounts: Vec<f64> = bonuses.iter().map(|b| b.amount).collect();
    amounts.sort_by(f64::total_cmp);

    let count = amounts.len();
    let total: f64 = amounts.iter().sum();
    let median = match count {
        0 => None,
        n if n % 2 == 1 => Some(amounts[n / 2]),
        n => Some((amounts[n / 2 - 1] + amounts[n / 2]) / 2.0),
    };

    BonusSummary {
        count,
        total: round_cents(total),
        mean: (count > 0).then(|| total / count as f64),
        median,
    }
}
