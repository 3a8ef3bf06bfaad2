//! Splitting raw agent output into string tables
//!
//! Agent output is a sequence of sections, each introduced by a header
//! line `<<<name>>>` or `<<<name:sep(N)>>>`, where `N` is the decimal
//! character code of the field separator. Without `sep` fields are split
//! on whitespace. Other header options are ignored.

use crate::models::{RawSections, StringTable};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    Whitespace,
    Char(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Header {
    name: String,
    separator: Separator,
}

/// Parse a header line, `None` if the line is not a header
fn parse_header(line: &str) -> Option<Header> {
    let inner = line.trim().strip_prefix("<<<")?.strip_suffix(">>>")?;
    let mut parts = inner.split(':');
    let name = parts.next()?.trim();
    if name.is_empty() {
        return None;
    }

    let mut separator = Separator::Whitespace;
    for option in parts {
        if let Some(code) = option
            .strip_prefix("sep(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            match code.trim().parse::<u32>().ok().and_then(char::from_u32) {
                Some(c) => separator = Separator::Char(c),
                None => debug!(section = name, option, "Ignoring invalid separator"),
            }
        } else {
            trace!(section = name, option, "Ignoring header option");
        }
    }

    Some(Header {
        name: name.to_string(),
        separator,
    })
}

fn split_row(line: &str, separator: Separator) -> Vec<String> {
    match separator {
        Separator::Whitespace => line.split_whitespace().map(str::to_string).collect(),
        Separator::Char(c) => line.split(c).map(str::to_string).collect(),
    }
}

/// Split agent output into raw sections
///
/// Lines before the first header are dropped. Repeated headers append to
/// the same section. Rows that are empty after splitting are dropped.
pub fn parse_agent_output(text: &str) -> RawSections {
    let mut sections = RawSections::new();
    let mut current: Option<(Header, StringTable)> = None;

    for line in text.lines() {
        if let Some(header) = parse_header(line) {
            if let Some((done, rows)) = current.take() {
                sections.entry(done.name).or_default().extend(rows);
            }
            // an empty section is still present
            sections.entry(header.name.clone()).or_default();
            current = Some((header, StringTable::new()));
            continue;
        }

        let Some((header, rows)) = current.as_mut() else {
            continue;
        };
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let row = split_row(line, header.separator);
        if !row.is_empty() {
            rows.push(row);
        }
    }

    if let Some((done, rows)) = current {
        sections.entry(done.name).or_default().extend(rows);
    }

    debug!(sections = sections.len(), "Split agent output");
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_with_separator() {
        let header = parse_header("<<<jolokia_info:sep(124)>>>").unwrap();
        assert_eq!(header.name, "jolokia_info");
        assert_eq!(header.separator, Separator::Char('|'));
    }

    #[test]
    fn test_header_ignores_unknown_options() {
        let header = parse_header("<<<lnx_if:cached(1,2):sep(9)>>>").unwrap();
        assert_eq!(header.name, "lnx_if");
        assert_eq!(header.separator, Separator::Char('\t'));
    }

    #[test]
    fn test_not_a_header() {
        assert!(parse_header("cpu 1 2 3").is_none());
        assert!(parse_header("<<<>>>").is_none());
    }

    #[test]
    fn test_split_sections() {
        let text = "\
garbage before header
<<<mem>>>
MemTotal:  1000 kB
MemFree:   400 kB

<<<jolokia_info:sep(124)>>>
JIRA|tomcat|7.0|1.3
<<<mem>>>
SwapTotal: 0 kB
";
        let sections = parse_agent_output(text);
        assert_eq!(sections.len(), 2);
        assert_eq!(
            sections["mem"],
            vec![
                vec!["MemTotal:", "1000", "kB"],
                vec!["MemFree:", "400", "kB"],
                vec!["SwapTotal:", "0", "kB"],
            ]
        );
        assert_eq!(sections["jolokia_info"], vec![vec!["JIRA", "tomcat", "7.0", "1.3"]]);
    }

    #[test]
    fn test_empty_section_is_present() {
        let sections = parse_agent_output("<<<diskstat>>>\n<<<mem>>>\nMemTotal: 1 kB\n");
        assert_eq!(sections.get("diskstat"), Some(&StringTable::new()));
    }
}
