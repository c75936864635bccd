//! Heuristic repair of unescaped quotes inside JSON string values.

/// Characters that may legitimately follow a closing string quote.
const CLOSING_FOLLOWERS: [char; 4] = [':', ',', '}', ']'];

/// Escape quotes that appear inside a JSON string but do not close it.
///
/// Scans the text tracking whether it is inside a string. An unescaped `"`
/// met inside a string closes it only when the character immediately after it
/// is one of `: , } ]` or the end of input. Any other such quote is escaped.
/// Text outside strings and already-escaped sequences are left untouched.
pub fn repair_unescaped_quotes(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 8);
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }

        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }

        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                let next = chars.get(i + 1);
                match next {
                    None => {
                        in_string = false;
                        out.push(c);
                    }
                    Some(ch) if CLOSING_FOLLOWERS.contains(ch) => {
                        in_string = false;
                        out.push(c);
                    }
                    Some(_) => out.push_str("\\\""),
                }
            }
            _ => out.push(c),
        }
    }

    out
}
