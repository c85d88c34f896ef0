//! Turns a snapshot into the bot's reply: a header line plus a 4-column table
//! flattened row-major, the shape an inline keyboard grid expects.

use serde::{Deserialize, Serialize};
use snapshot::{BitcoinSnapshot, BitcoinTierKind, EthereumSnapshot, EthereumTierKind, WaitRange};

pub const COLUMNS: usize = 4;
pub const HEADER_ROW: [&str; COLUMNS] = ["-", "Price", "Wait", "USD"];

pub const NOT_FOUND_REPLY: &str = "Data not found";
pub const FAILURE_REPLY: &str = "ERR: failed to load fee data";
pub const UNKNOWN_WAIT: &str = "?";

/// Size in bytes of a typical one-input two-output transaction.
const BITCOIN_TX_BYTES: u64 = 226;
/// Gas of a plain ether transfer.
const ETHEREUM_TRANSFER_GAS: f64 = 21_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    #[serde(default)]
    pub cells: Vec<String>,
    pub columns: usize,
}

impl Reply {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cells: Vec::new(),
            columns: COLUMNS,
        }
    }

    pub fn with_table(text: impl Into<String>, table: Table) -> Self {
        Self {
            text: text.into(),
            cells: table.into_cells(),
            columns: COLUMNS,
        }
    }

    pub fn not_found() -> Self {
        Self::message(NOT_FOUND_REPLY)
    }

    pub fn failure() -> Self {
        Self::message(FAILURE_REPLY)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    cells: Vec<String>,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    /// A table holding only the header row.
    pub fn new() -> Self {
        Self {
            cells: HEADER_ROW.iter().map(|cell| cell.to_string()).collect(),
        }
    }

    pub fn push_row(&mut self, row: [String; COLUMNS]) {
        self.cells.extend(row);
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.cells.chunks(COLUMNS)
    }

    pub fn into_cells(self) -> Vec<String> {
        self.cells
    }
}

/// `>= 1.0` minutes renders as-is in minutes, anything shorter as whole seconds.
pub fn format_wait_minutes(wait: f64) -> String {
    if wait >= 1.0 {
        format!("{wait} m")
    } else {
        format!("{} s", (wait * 60.0).floor())
    }
}

pub fn format_wait_range(wait: Option<WaitRange>) -> String {
    match wait {
        Some(range) => format!("{}-{} m", range.min_minutes, range.max_minutes),
        None => UNKNOWN_WAIT.to_string(),
    }
}

/// Truncated fee estimate for a typical transaction at `fee` sat/byte.
///
/// The floor runs before the last division, so the result moves in steps of 0.1.
pub fn bitcoin_usd_estimate(fee: u64) -> f64 {
    let tx_cost = fee.saturating_mul(BITCOIN_TX_BYTES) as f64;
    (tx_cost / 10f64.powi(3)).floor() / 10.0
}

/// Dollar cost of a transfer at `raw_price` (gwei times ten), in steps of 0.001.
pub fn ethereum_usd_estimate(raw_price: f64, ether_price: f64) -> f64 {
    // `raw_price` is ten times gwei, hence 10^7 rather than 10^9 below.
    let tx_cost = ETHEREUM_TRANSFER_GAS * raw_price * ether_price;
    (tx_cost / 10f64.powi(7)).floor() / 1000.0
}

pub fn bitcoin_table(snapshot: &BitcoinSnapshot) -> Table {
    let mut table = Table::new();
    for kind in BitcoinTierKind::ALL {
        let tier = snapshot.tier(kind);
        table.push_row([
            kind.label().to_string(),
            tier.price.to_string(),
            format_wait_range(tier.wait),
            format!("{} $", bitcoin_usd_estimate(tier.price)),
        ]);
    }
    table
}

pub fn bitcoin_header(_snapshot: &BitcoinSnapshot) -> String {
    "Bitcoin network fees:".to_string()
}

pub fn ethereum_table(snapshot: &EthereumSnapshot) -> Table {
    let mut table = Table::new();
    for kind in EthereumTierKind::ALL {
        let tier = snapshot.tier(kind);
        table.push_row([
            kind.label().to_string(),
            format!("{} Gwei", tier.price / 10.0),
            format_wait_minutes(tier.wait),
            format!(
                "{} $",
                ethereum_usd_estimate(tier.price, snapshot.ether_price)
            ),
        ]);
    }
    table
}

pub fn ethereum_header(snapshot: &EthereumSnapshot) -> String {
    format!(
        "Data is actual for block #{}. Blockchain load: {}%",
        snapshot.block_num,
        (snapshot.speed * 100.0).floor()
    )
}

pub fn bitcoin_reply(snapshot: &BitcoinSnapshot) -> Reply {
    Reply::with_table(bitcoin_header(snapshot), bitcoin_table(snapshot))
}

pub fn ethereum_reply(snapshot: &EthereumSnapshot) -> Reply {
    Reply::with_table(ethereum_header(snapshot), ethereum_table(snapshot))
}

/// Plain-text layout of a reply: the text line, then the cells padded into columns.
pub fn render_grid(reply: &Reply) -> String {
    let columns = reply.columns.clamp(1, reply.cells.len().max(1));
    let mut widths = vec![0usize; columns];
    for (idx, cell) in reply.cells.iter().enumerate() {
        let width = &mut widths[idx % columns];
        *width = (*width).max(cell.chars().count());
    }

    let mut out = reply.text.clone();
    for row in reply.cells.chunks(columns) {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        out.push('\n');
        out.push_str(line.trim_end());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use snapshot::{BitcoinTier, EthereumTier, SnapshotKey};

    fn key() -> SnapshotKey {
        SnapshotKey::at(&Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    fn bitcoin() -> BitcoinSnapshot {
        BitcoinSnapshot {
            key: key(),
            btc_price: 50_000.0,
            low: BitcoinTier {
                price: 10,
                wait: Some(WaitRange {
                    min_minutes: 60,
                    max_minutes: 240,
                }),
            },
            normal: BitcoinTier {
                price: 50,
                wait: Some(WaitRange {
                    min_minutes: 30,
                    max_minutes: 60,
                }),
            },
            fast: BitcoinTier {
                price: 100,
                wait: None,
            },
        }
    }

    fn ethereum() -> EthereumSnapshot {
        EthereumSnapshot {
            key: key(),
            ether_price: 200.0,
            block_num: 7_000_000,
            block_time: 14.2,
            speed: 0.8567,
            safe_low: EthereumTier {
                price: 15.0,
                wait: 0.5,
            },
            average: EthereumTier {
                price: 100.0,
                wait: 1.0,
            },
            fast: EthereumTier {
                price: 200.0,
                wait: 2.5,
            },
            fastest: EthereumTier {
                price: 400.0,
                wait: 0.99,
            },
        }
    }

    #[test]
    fn wait_cutoff_is_exactly_one_minute() {
        assert_eq!(format_wait_minutes(0.5), "30 s");
        assert_eq!(format_wait_minutes(1.0), "1 m");
        assert_eq!(format_wait_minutes(2.5), "2.5 m");
        assert_eq!(format_wait_minutes(0.99), "59 s");
        assert_eq!(format_wait_minutes(0.0), "0 s");
    }

    #[test]
    fn bitcoin_estimate_floors_before_scaling() {
        assert_eq!(bitcoin_usd_estimate(100), 2.2);
        assert_eq!(format!("{} $", bitcoin_usd_estimate(100)), "2.2 $");
        // 226 * 4 = 904 -> 0.904 -> floor 0.
        assert_eq!(bitcoin_usd_estimate(4), 0.0);
        assert_eq!(format!("{}", bitcoin_usd_estimate(5)), "0.1");
    }

    #[test]
    fn ethereum_estimate_keeps_three_decimals() {
        assert_eq!(ethereum_usd_estimate(100.0, 200.0), 0.042);
        // 21000 * 15 * 123.45 / 1e7 = 3.888... -> 3 -> 0.003
        assert_eq!(ethereum_usd_estimate(15.0, 123.45), 0.003);
    }

    #[test]
    fn bitcoin_table_has_header_and_three_rows() {
        let table = bitcoin_table(&bitcoin());
        assert_eq!(table.cells().len(), 16);
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows[0], HEADER_ROW.map(String::from));
        assert_eq!(rows[1], ["Low", "10", "60-240 m", "0.2 $"].map(String::from));
        assert_eq!(rows[2], ["Normal", "50", "30-60 m", "1.1 $"].map(String::from));
        assert_eq!(rows[3], ["Fast", "100", "?", "2.2 $"].map(String::from));
    }

    #[test]
    fn ethereum_table_renders_gwei_and_wait_units() {
        let table = ethereum_table(&ethereum());
        assert_eq!(table.cells().len(), 20);
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows[1], ["Low", "1.5 Gwei", "30 s", "0.006 $"].map(String::from));
        assert_eq!(rows[2], ["Normal", "10 Gwei", "1 m", "0.042 $"].map(String::from));
        assert_eq!(rows[3][2], "2.5 m");
        assert_eq!(rows[4][0], "Fastest");
        assert_eq!(rows[4][2], "59 s");
    }

    #[test]
    fn headers_describe_the_snapshot() {
        assert_eq!(bitcoin_header(&bitcoin()), "Bitcoin network fees:");
        assert_eq!(
            ethereum_header(&ethereum()),
            "Data is actual for block #7000000. Blockchain load: 85%"
        );
    }

    #[test]
    fn reply_serializes_for_the_wire() {
        let reply = bitcoin_reply(&bitcoin());
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["columns"], 4);
        assert_eq!(value["cells"].as_array().unwrap().len(), 16);

        let bare: Reply = serde_json::from_str(r#"{"text":"Data not found","columns":4}"#).unwrap();
        assert_eq!(bare, Reply::not_found());
    }

    #[test]
    fn grid_pads_columns() {
        let mut table = Table::new();
        table.push_row(["Normal", "5", "10-20 m", "0.1 $"].map(String::from));
        let grid = render_grid(&Reply::with_table("Fees:", table));
        let lines: Vec<_> = grid.lines().collect();
        assert_eq!(lines[0], "Fees:");
        assert_eq!(lines[1], "-       Price  Wait     USD");
        assert_eq!(lines[2], "Normal  5      10-20 m  0.1 $");
    }

    #[test]
    fn grid_ignores_oversized_column_count() {
        let reply = Reply {
            text: "Fees:".into(),
            cells: vec!["a".into(), "bb".into()],
            columns: usize::MAX,
        };
        assert_eq!(render_grid(&reply), "Fees:\na  bb");
    }

    #[test]
    fn grid_of_plain_message_is_just_text() {
        assert_eq!(render_grid(&Reply::not_found()), NOT_FOUND_REPLY);
    }
}
