use super::Error;

/// Split a block of SQL into its constituent statements, each retaining its
/// closing ';'. Semicolons within literals and comments don't end a
/// statement: SQLite itself decides when a statement is complete.
/// Statements consisting only of a ';' are dropped.
pub fn split_statements(mut block: &str) -> Result<Vec<&str>, Error> {
    let mut statements = Vec::new();
    let mut pivot = 0;

    while !block.is_empty() {
        let Some(offset) = block[pivot..].find(';') else {
            if block.chars().all(char::is_whitespace) {
                break;
            }
            return Err(Error::BlockTrailingContent {
                trailing: block.trim().to_string(),
            });
        };
        pivot += offset + 1;

        let candidate = std::ffi::CString::new(&block[..pivot])?;
        if unsafe { rusqlite::ffi::sqlite3_complete(candidate.as_ptr()) } == 0 {
            continue; // The ';' was quoted or commented. Keep scanning.
        }

        if block[..pivot].trim() != ";" {
            statements.push(&block[..pivot]);
        }
        block = &block[pivot..];
        pivot = 0;
    }

    Ok(statements)
}
