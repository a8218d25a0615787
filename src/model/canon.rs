//! Canonical book codes and display-name formatting.

/// OSIS-style codes for the 66-book Protestant canon, indexed by MySword
/// book number minus one.
const CANON_CODES: [&str; 66] = [
    "Gen", "Exod", "Lev", "Num", "Deut", "Josh", "Judg", "Ruth", "1Sam", "2Sam", "1Kgs", "2Kgs",
    "1Chr", "2Chr", "Ezra", "Neh", "Esth", "Job", "Ps", "Prov", "Eccl", "Song", "Isa", "Jer",
    "Lam", "Ezek", "Dan", "Hos", "Joel", "Amos", "Obad", "Jonah", "Mic", "Nah", "Hab", "Zeph",
    "Hag", "Zech", "Mal", "Matt", "Mark", "Luke", "John", "Acts", "Rom", "1Cor", "2Cor", "Gal",
    "Eph", "Phil", "Col", "1Thess", "2Thess", "1Tim", "2Tim", "Titus", "Phlm", "Heb", "Jas",
    "1Pet", "2Pet", "1John", "2John", "3John", "Jude", "Rev",
];

/// Short code for a book ordinal when the language source has none.
pub fn default_code(ordinal: u32) -> String {
    ordinal
        .checked_sub(1)
        .and_then(|i| CANON_CODES.get(i as usize))
        .map(|code| code.to_string())
        .unwrap_or_else(|| format!("B{ordinal}"))
}

/// Insert `". "` between a leading book number and the name (`1John` →
/// `1. John`). Names already separated by a dot or space are unchanged.
pub fn format_book_name(name: &str) -> String {
    let digits = name.bytes().take_while(u8::is_ascii_digit).count();
    match name[digits..].chars().next() {
        Some(next) if digits > 0 && next != '.' && !next.is_whitespace() => {
            format!("{}. {}", &name[..digits], &name[digits..])
        }
        _ => name.to_string(),
    }
}
