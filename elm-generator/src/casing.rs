//! Turns dotted protobuf names into Elm identifiers.
//!
//! A qualified name is split on `.` into segments and each segment into words
//! on runs of underscores and on case runs (`URLTag` is `URL`, `Tag`). Every
//! word is then capitalised with the rest lowercased, so `My.URLIs_Here`
//! becomes `MyUrlIsHere`. Empty words become a placeholder `X`, which keeps
//! the result non-empty and stops it from starting with a digit.

/// Stands in for an empty word and prefixes a first word that isn't a letter.
const PLACEHOLDER: char = 'X';

/// Elm keywords. Never usable as an identifier of any kind.
pub const KEYWORDS: &[&str] = &[
    "if", "then", "else", "case", "of", "let", "in", "type", "module", "where", "import",
    "exposing", "as", "port",
];

/// Keywords plus everything the implicit prelude brings into scope.
pub const RESERVED_WORDS: &[&str] = &[
    // Keywords
    "if", "then", "else", "case", "of", "let", "in", "type", "module", "where", "import",
    "exposing", "as", "port",
    // Prelude modules and types
    "Basics", "List", "Maybe", "Result", "String", "Char", "Tuple", "Debug", "Platform", "Cmd",
    "Sub",
    // Basics(..)
    "Int", "Float", "toFloat", "round", "floor", "ceiling", "truncate", "max", "min", "compare",
    "LT", "EQ", "GT", "Bool", "True", "False", "not", "xor", "modBy", "remainderBy", "negate",
    "abs", "clamp", "sqrt", "logBase", "e", "degrees", "radians", "turns", "pi", "cos", "sin",
    "tan", "acos", "asin", "atan", "atan2", "toPolar", "fromPolar", "isNaN", "isInfinite",
    "identity", "always", "Never", "never",
    // Other default imports
    "Just", "Nothing", "Ok", "Err", "Program",
];

/// Casts a qualified name into an Elm identifier. Segments are joined with
/// `separator`; `as_type` picks an uppercase (type) or lowercase (value) start.
pub fn casing(qualified: &str, separator: &str, as_type: bool) -> String {
    let mut segments: Vec<String> = Vec::new();
    for (i, segment) in qualified.split('.').enumerate() {
        let mut cased = String::with_capacity(segment.len() + 1);
        for (j, word) in split_words(segment, i == 0).iter().enumerate() {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                if i == 0 && j == 0 && !as_type {
                    cased.extend(first.to_lowercase());
                } else {
                    cased.extend(first.to_uppercase());
                }
                cased.push_str(&chars.as_str().to_lowercase());
            }
        }
        segments.push(cased);
    }

    let mut id = segments.join(separator);
    if !starts_with_letter(&id) {
        let placeholder = if as_type {
            PLACEHOLDER
        } else {
            PLACEHOLDER.to_ascii_lowercase()
        };
        id.insert(0, placeholder);
    }
    id
}

fn split_words(segment: &str, first_segment: bool) -> Vec<String> {
    let mut words = Vec::new();
    let mut buf = String::new();
    let (mut caps, mut underscore) = (false, false);

    for c in segment.chars() {
        if c == '_' {
            // A run of underscores is one boundary.
            if !underscore {
                underscore = true;
                caps = false;
                push_word(&mut words, std::mem::take(&mut buf), first_segment);
            }
            continue;
        }
        underscore = false;
        if c.is_uppercase() {
            if !caps && !buf.is_empty() {
                push_word(&mut words, std::mem::take(&mut buf), first_segment);
            }
            caps = true;
        } else if caps && !c.is_numeric() {
            // Leaving a run of caps: the new word began one character ago.
            caps = false;
            if let Some(last) = buf.pop() {
                if !buf.is_empty() {
                    push_word(&mut words, std::mem::take(&mut buf), first_segment);
                }
                buf.push(last);
            }
        }
        buf.push(c);
    }
    push_word(&mut words, buf, first_segment);
    words
}

fn push_word(words: &mut Vec<String>, mut word: String, first_segment: bool) {
    if word.is_empty() {
        word.push(PLACEHOLDER);
    }
    if first_segment && words.is_empty() && !starts_with_letter(&word) {
        word.insert(0, PLACEHOLDER);
    }
    words.push(word);
}

fn starts_with_letter(s: &str) -> bool {
    s.chars().next().is_some_and(char::is_alphabetic)
}

/// A complete Elm identifier: a letter followed by letters, digits or underscores.
/// Does not check for reserved words.
pub fn is_valid_id(id: &str) -> bool {
    starts_with_letter(id) && is_valid_partial_id(&id[id.chars().next().map_or(0, char::len_utf8)..])
}

/// Valid as the tail of an identifier. The empty string qualifies.
pub fn is_valid_partial_id(partial: &str) -> bool {
    partial.chars().all(|c| c.is_alphanumeric() || c == '_')
}

pub fn is_reserved(id: &str) -> bool {
    RESERVED_WORDS.contains(&id)
}

/// Dotted Elm module name, each segment a type identifier.
pub fn is_valid_module_name(name: &str) -> bool {
    name.split('.')
        .all(|segment| is_valid_id(segment) && starts_with_uppercase(segment))
}

fn starts_with_uppercase(s: &str) -> bool {
    s.chars().next().is_some_and(char::is_uppercase)
}

/// Elm module for a protobuf package, e.g. `my.pkg` -> `My.Pkg`.
pub fn package_module_name(package: &str, prefix: &str) -> String {
    let name = package
        .split('.')
        .map(|segment| casing(segment, "", true))
        .collect::<Vec<_>>()
        .join(".");
    if prefix.is_empty() {
        name
    } else {
        format!("{prefix}.{name}")
    }
}

/// Module name for a file without a package: its path minus the extension,
/// with non-alphanumeric ends trimmed and directories read as segments.
pub fn file_module_source(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(".proto").unwrap_or(file_name);
    let trimmed = stem.trim_matches(|c: char| !c.is_alphanumeric());
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.replace('/', "."))
    }
}
