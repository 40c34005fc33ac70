use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Write;

use crate::history::key_state::{KeyHistoryEntry, KeyState};
use crate::types::short_value;

/// Render the history of a key as a table.
///
/// The first column is the entry version; every other column belongs to one
/// `(client, thread)` writer and is headed `c<client> (<short thread>)`. Each
/// entry fills the cell of the writer that produced it with the last three
/// characters of its value, `Rm` for a remove, and a ` *` suffix when the entry
/// was committed by a transaction. The output ends with a newline.
#[must_use]
pub fn format_key_history(state: &KeyState) -> String {
    let writers: Vec<_> = state.writers().collect();

    let mut header = vec![String::from("Version")];
    header.extend(
        writers
            .iter()
            .map(|(client_id, thread)| format!("c{client_id} ({thread})")),
    );

    let rows: Vec<Vec<String>> = state
        .history()
        .iter()
        .map(|entry| {
            let column = entry.origin.column();
            let mut row = vec![entry.version.to_string()];
            row.extend(writers.iter().map(|&writer| {
                if *writer == column {
                    format_cell(entry)
                } else {
                    String::new()
                }
            }));
            row
        })
        .collect();

    render_table(&header, &rows)
}

fn format_cell(entry: &KeyHistoryEntry) -> String {
    let mut cell = entry
        .value
        .as_deref()
        .map_or_else(|| String::from("Rm"), |value| short_value(value).to_string());
    if entry.from_transaction() {
        cell.push_str(" *");
    }
    cell
}

fn render_table(header: &[String], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .chain(core::iter::once(header[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut rule = String::from("+");
    for width in &widths {
        rule.push_str(&"-".repeat(width + 2));
        rule.push('+');
    }

    let mut output = String::new();
    let _ = writeln!(output, "{rule}");
    render_row(&mut output, header, &widths);
    let _ = writeln!(output, "{rule}");
    for row in rows {
        render_row(&mut output, row, &widths);
    }
    if !rows.is_empty() {
        let _ = writeln!(output, "{rule}");
    }
    output
}

fn render_row(output: &mut String, cells: &[String], widths: &[usize]) {
    for (cell, width) in cells.iter().zip(widths) {
        let _ = write!(output, "| {cell:^width$} ");
    }
    let _ = writeln!(output, "|");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Key, Version};

    #[test]
    fn test_format_empty_history() {
        let state = KeyState::new(Key::new("m1", "k1"));
        assert_eq!(
            format_key_history(&state),
            "+---------+\n| Version |\n+---------+\n"
        );
    }

    #[test]
    fn test_format_history_columns_per_writer() {
        let mut state = KeyState::new(Key::new("m1", "k1"));
        state.put(Some("value-abc".into()), Version(5), None, "pool-1-thread-1", 0);
        state.put(None, Version(7), None, "pool-1-thread-2", 1);
        state.commit(
            Some("xyz".into()),
            Version(9),
            None,
            Some(Version(6)),
            Version(9),
            "pool-1-thread-1",
            0,
        );

        let expected = "\
+---------+--------+--------+
| Version | c0 (1) | c1 (2) |
+---------+--------+--------+
|    5    |  abc   |        |
|    7    |        |   Rm   |
|    9    | xyz *  |        |
+---------+--------+--------+
";
        assert_eq!(format_key_history(&state), expected);
    }
}
