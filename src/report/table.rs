//! Plain-text grid for `--table`: thin row rules, a double rule under the
//! header, centered cells with one space of horizontal padding.

pub fn render(header: &[String], rows: &[Vec<String>]) -> String {
    let ncols = header.len().max(rows.iter().map(|r| r.len()).max().unwrap_or(0));
    let mut widths = vec![0usize; ncols];
    for row in std::iter::once(header).chain(rows.iter().map(|r| r.as_slice())) {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let rule = |c: char| {
        let segments: Vec<String> = widths.iter().map(|w| c.to_string().repeat(w + 2)).collect();
        format!("+{}+", segments.join("+"))
    };
    let line = |cells: &[String]| {
        let segments: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                format!(" {:^w$} ", cell)
            })
            .collect();
        format!("|{}|", segments.join("|"))
    };

    let mut out = Vec::with_capacity(2 * rows.len() + 3);
    out.push(rule('-'));
    out.push(line(header));
    out.push(rule('='));
    for row in rows {
        out.push(line(row));
        out.push(rule('-'));
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn renders_grid() {
        let header = strings(&["Name", "Covid"]);
        let rows = vec![strings(&["a.jpg", "9.5 %"]), strings(&["bb.jpg", "100.0 %"])];
        let expected = "\
+--------+---------+
|  Name  |  Covid  |
+========+=========+
| a.jpg  |  9.5 %  |
+--------+---------+
| bb.jpg | 100.0 % |
+--------+---------+";
        assert_eq!(render(&header, &rows), expected);
    }

    #[test]
    fn header_only() {
        let out = render(&strings(&["Name"]), &[]);
        assert_eq!(out.lines().count(), 3);
        assert!(out.ends_with("+======+"));
    }
}
