use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Fixed-width text table: header row, dashed rule, one line per row.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    print!("{}", render_table(headers, &rows));
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(String::len)
                .chain([h.len()])
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render_row = |cells: &[String]| -> String {
        let line = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join("  ");
        format!("{}\n", line.trim_end())
    };

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();

    let mut out = render_row(&header_cells);
    out.push_str(&render_row(&rule));
    for row in rows {
        out.push_str(&render_row(row));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_align_to_widest_cell() {
        let out = render_table(
            &["TEAM", "STATUS"],
            &[
                vec!["team1".to_string(), "in_progress".to_string()],
                vec!["team2".to_string(), "idle".to_string()],
            ],
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "TEAM   STATUS");
        assert_eq!(lines[1], "-----  -----------");
        assert_eq!(lines[2], "team1  in_progress");
        assert_eq!(lines[3], "team2  idle");
    }

    #[test]
    fn empty_rows_still_print_headers() {
        let out = render_table(&["PATH", "OWNER"], &[]);
        assert!(out.starts_with("PATH  OWNER\n"));
        assert_eq!(out.lines().count(), 2);
    }
}
