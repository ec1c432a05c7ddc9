use crate::FlowReport;

const DATE_LAYOUT: &str = "%m/%d/%Y";
const INFLOW_EMOJI: &str = "\u{1F680}";
const OUTFLOW_EMOJI: &str = "\u{1F44E}";
const BANK_EMOJI: &str = "\u{1F3E6}";

pub struct MessageTemplate;

impl MessageTemplate {
    /// `IBIT` or `IBIT 02/16/2024` when the observation is dated.
    pub fn header(report: &FlowReport) -> String {
        match report.as_of {
            Some(date) => format!("{} {}", report.ticker, date.format(DATE_LAYOUT)),
            None => report.ticker.clone(),
        }
    }

    pub fn structured_body(report: &FlowReport) -> String {
        format!(
            "CHANGE Bitcoin: {:.1}\nTOTAL Bitcoin: {:.1}\nDETAILS Flow: ${:.1}, CMEBRRNY: ${:.1}",
            report.delta, report.total, report.flow, report.reference_price
        )
    }

    pub fn short_text(report: &FlowReport) -> String {
        let emoji = if report.is_outflow() {
            OUTFLOW_EMOJI
        } else {
            INFLOW_EMOJI
        };
        let note = report.footnote.as_deref().unwrap_or("");

        format!(
            "{} ${}\n\n{} FLOW: {} BTC, ${}\n{} TOTAL Bitcoin in Trust: {} $BTC\n\n{}",
            report.display_name,
            report.ticker,
            emoji,
            format_grouped(report.delta, 2),
            format_grouped(report.flow, 0),
            BANK_EMOJI,
            format_grouped(report.total, 1),
            note
        )
    }
}

/// Round to `decimals`, drop trailing fractional zeros, group thousands with commas.
pub fn format_grouped(value: f64, decimals: usize) -> String {
    let rounded = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match rounded.split_once('.') {
        Some((int_part, frac)) => (int_part, frac.trim_end_matches('0')),
        None => (rounded.as_str(), ""),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let is_zero = int_part.chars().all(|c| c == '0') && frac_part.is_empty();
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };

    if frac_part.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac_part}")
    }
}
