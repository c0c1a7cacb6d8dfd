// Turns assistant messages (Markdown with the occasional HTML tag) into plain prose for the
// speech synthesizer. Markup that would be read out literally is stripped; the words
// themselves are kept.

use crate::once_cell_regex;


pub fn sanitize_for_speech(text: &str) -> String {
    let fenced_code_re = once_cell_regex!(r"(?s)```.*?```");
    let html_tag_re = once_cell_regex!(r"</?[a-zA-Z][^>]*>");
    let image_re = once_cell_regex!(r"!\[([^\]]*)\]\([^)]*\)");
    let link_re = once_cell_regex!(r"\[([^\]]*)\]\([^)]*\)");
    let inline_code_re = once_cell_regex!(r"`([^`]*)`");
    let bold_re = once_cell_regex!(r"(\*\*|__)(.+?)(\*\*|__)");
    let italic_star_re = once_cell_regex!(r"\*([^*\n]+)\*");
    let italic_underscore_re = once_cell_regex!(r"\b_([^_\n]+)_\b");
    let heading_re = once_cell_regex!(r"(?m)^[ \t]{0,3}#{1,6}[ \t]*");
    let quote_re = once_cell_regex!(r"(?m)^[ \t]*>[ \t]?");
    let bullet_re = once_cell_regex!(r"(?m)^[ \t]*[-*+][ \t]+");
    let rule_re = once_cell_regex!(r"(?m)^[ \t]*([-*_][ \t]*){3,}$");
    let paragraph_break_re = once_cell_regex!(r"\n\s*\n");
    let whitespace_re = once_cell_regex!(r"\s+");

    let text = fenced_code_re.replace_all(text, " ");
    let text = html_tag_re.replace_all(&text, " ");
    let text = image_re.replace_all(&text, "$1");
    let text = link_re.replace_all(&text, "$1");
    let text = inline_code_re.replace_all(&text, "$1");
    let text = bold_re.replace_all(&text, "$2");
    let text = italic_star_re.replace_all(&text, "$1");
    let text = italic_underscore_re.replace_all(&text, "$1");
    let text = rule_re.replace_all(&text, "");
    let text = heading_re.replace_all(&text, "");
    let text = quote_re.replace_all(&text, "");
    let text = bullet_re.replace_all(&text, "");
    let text = decode_entities(&text);
    // A paragraph break is a pause. Make sure the synthesizer hears one.
    let text = paragraph_break_re.replace_all(&text, ". ");
    let text = whitespace_re.replace_all(&text, " ");
    let text = text.replace(".. ", ". ").replace(":. ", ": ").replace("?. ", "? ").replace("!. ", "! ");
    text.trim().to_owned()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
