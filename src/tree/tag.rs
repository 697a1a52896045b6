/// The closed set of tag names the normaliser acts on.
///
/// Everything else maps to [`Tag::Other`] and passes through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Title,
    Body,
    Meta,
    Form,
    Br,
    Font,
    Div,
    Img,
    P,
    U,
    Strong,
    Table,
    Thead,
    Tbody,
    Tr,
    Th,
    Td,
    Ol,
    Ul,
    Li,
    Other,
}

const NAMES: &[(&str, Tag)] = &[
    ("html", Tag::Html),
    ("head", Tag::Head),
    ("title", Tag::Title),
    ("body", Tag::Body),
    ("meta", Tag::Meta),
    ("form", Tag::Form),
    ("br", Tag::Br),
    ("font", Tag::Font),
    ("div", Tag::Div),
    ("img", Tag::Img),
    ("p", Tag::P),
    ("u", Tag::U),
    ("strong", Tag::Strong),
    ("table", Tag::Table),
    ("thead", Tag::Thead),
    ("tbody", Tag::Tbody),
    ("tr", Tag::Tr),
    ("th", Tag::Th),
    ("td", Tag::Td),
    ("ol", Tag::Ol),
    ("ul", Tag::Ul),
    ("li", Tag::Li),
];

impl Tag {
    pub fn from_name(name: &str) -> Tag {
        NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, tag)| tag)
            .unwrap_or(Tag::Other)
    }

    /// Canonical lower-case name; `None` for [`Tag::Other`].
    pub fn name(self) -> Option<&'static str> {
        NAMES.iter().find(|&&(_, t)| t == self).map(|&(n, _)| n)
    }
}

/// Elements that never have content and serialise as `<x />`.
pub(crate) fn is_void(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "area"
            | "base"
            | "basefont"
            | "bgsound"
            | "br"
            | "col"
            | "embed"
            | "frame"
            | "hr"
            | "img"
            | "input"
            | "keygen"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Elements whose text content is written without escaping.
pub(crate) fn is_raw_text(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "script" | "style" | "xmp" | "iframe" | "noembed" | "noframes" | "noscript" | "plaintext"
    )
}

/// Elements whose first newline the parser swallows, so serialising one
/// must write an extra `\n` to keep a leading newline of content.
pub(crate) fn drops_leading_newline(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "pre" | "textarea" | "listing"
    )
}
