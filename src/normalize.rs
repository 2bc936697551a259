//! Label canonicalization.
//!
//! Hierarchical labels arrive with several separator spellings depending on the
//! stage that produced them: `root > A > B` from the taxonomy tree, `A--B--C`
//! from raw category columns, `A-B-C`, `A_B_C` and `A—B—C` from the external
//! vocabulary. Everything here is a pure function over `&str`.

use lazy_static::lazy_static;
use regex::Regex;

/// Separator used in canonical paths.
pub const CANONICAL_SEPARATOR: &str = "-";

/// Separator used when displaying taxonomy paths.
pub const DISPLAY_SEPARATOR: &str = " > ";

/// Name of the synthetic root node in taxonomy trees.
pub const ROOT_NAME: &str = "root";

/// Filler for missing upper hierarchy levels.
pub const GENERIC_LEVEL: &str = "通用领域";

/// Hierarchy level of an empty label.
pub const UNKNOWN_LEVEL: &str = "未知";

const PLACEHOLDERS: [&str; 5] = ["", "nan", "NaN", "None", "无"];

lazy_static! {
    static ref ROOT_PREFIX: Regex = Regex::new(r"^\s*root\s*>\s*").unwrap();
    // any run of `>`, `-`, `_` or em-dash, with the whitespace around it
    static ref SEPARATOR: Regex = Regex::new(r"\s*(?:>|-|_|—)+\s*").unwrap();
    static ref CONTROL_CHARS: Regex = Regex::new(r"[\x00-\x08\x0b\x0c\x0e-\x1f\x7f]").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Top three levels of an external label, used to group graph nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyLevels {
    pub l1: String,
    pub l2: String,
    pub l3: String,
}

impl HierarchyLevels {
    pub fn unknown() -> Self {
        Self {
            l1: UNKNOWN_LEVEL.to_string(),
            l2: UNKNOWN_LEVEL.to_string(),
            l3: UNKNOWN_LEVEL.to_string(),
        }
    }
}

/// Removes a leading `root >` marker.
pub fn strip_root(text: &str) -> &str {
    match ROOT_PREFIX.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// Path segments after root stripping and separator collapsing. Empty segments
/// are dropped.
pub fn segments(text: &str) -> Vec<&str> {
    SEPARATOR
        .split(strip_root(text))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// `A > B--C_D` becomes `A-B-C-D`.
pub fn canonical_path(text: &str) -> String {
    segments(text).join(CANONICAL_SEPARATOR)
}

/// The final path segment, or an empty string when there is none.
pub fn leaf_key(text: &str) -> String {
    segments(text)
        .last()
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Display form: root marker removed, control characters stripped, whitespace
/// collapsed. Separators are left as they are.
pub fn clean_display(text: &str) -> String {
    let text = strip_root(text).replace(['\n', '\t'], " ").replace('\r', "");
    let text = CONTROL_CHARS.replace_all(&text, "");
    WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
}

/// The last three canonical segments, left-padded with [`GENERIC_LEVEL`].
pub fn hierarchy_levels(text: &str) -> HierarchyLevels {
    let mut parts = segments(text);
    if parts.is_empty() {
        return HierarchyLevels::unknown();
    }
    while parts.len() < 3 {
        parts.insert(0, GENERIC_LEVEL);
    }
    let n = parts.len();
    HierarchyLevels {
        l1: parts[n - 3].to_string(),
        l2: parts[n - 2].to_string(),
        l3: parts[n - 1].to_string(),
    }
}

/// Values spreadsheets and pandas exports use for "nothing here".
pub fn is_placeholder(text: &str) -> bool {
    PLACEHOLDERS.contains(&text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_key_separator_table() {
        let cases = [
            ("root > 先进制造 > 增材制造", "增材制造"),
            ("先进制造 > 增材制造", "增材制造"),
            ("先进制造>增材制造", "增材制造"),
            ("先进制造--工艺--其他", "其他"),
            ("先进制造-工业互联网-现场总线技术", "现场总线技术"),
            ("先进制造_增材制造", "增材制造"),
            ("先进制造—增材制造", "增材制造"),
            ("  增材制造技术  ", "增材制造技术"),
            ("root > 自动化技术", "自动化技术"),
            ("", ""),
            ("  ", ""),
            ("a - b -", "b"),
        ];
        for (input, expected) in cases {
            assert_eq!(leaf_key(input), expected, "leaf_key({:?})", input);
        }
    }

    #[test]
    fn test_canonical_path_collapses_every_separator() {
        assert_eq!(canonical_path("root > A > B"), "A-B");
        assert_eq!(canonical_path("A--B--C"), "A-B-C");
        assert_eq!(canonical_path("A_B—C"), "A-B-C");
        assert_eq!(canonical_path("A -> B"), "A-B");
        assert_eq!(canonical_path("rootless > A"), "rootless-A");
    }

    #[test]
    fn test_clean_display() {
        assert_eq!(clean_display("root > A > B"), "A > B");
        assert_eq!(clean_display("产线\n自动化\t项目\r"), "产线 自动化 项目");
        assert_eq!(clean_display("a\x07b"), "ab");
        assert_eq!(clean_display("  a    b  "), "a b");
    }

    #[test]
    fn test_hierarchy_levels() {
        let levels = hierarchy_levels("先进制造-工业互联网-现场总线技术");
        assert_eq!(levels.l1, "先进制造");
        assert_eq!(levels.l2, "工业互联网");
        assert_eq!(levels.l3, "现场总线技术");

        let padded = hierarchy_levels("涂层材料");
        assert_eq!(padded.l1, GENERIC_LEVEL);
        assert_eq!(padded.l2, GENERIC_LEVEL);
        assert_eq!(padded.l3, "涂层材料");

        assert_eq!(hierarchy_levels(""), HierarchyLevels::unknown());
    }

    #[test]
    fn test_placeholders() {
        assert!(is_placeholder("nan"));
        assert!(is_placeholder(" 无 "));
        assert!(is_placeholder(""));
        assert!(!is_placeholder("自动化技术"));
    }
}
