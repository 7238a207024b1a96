//! Parsing of the ASCII header.

use std::str;

use log::debug;

use crate::{
    error::Result,
    scalar::ScalarType,
    scene::{Element, Format, ObjectInfo, Property, PropertyType},
    util::{self, Lines},
    MAX_HEADER_LINE_LEN,
    MAX_NAME_LEN,
};
use super::LoadOptions;


/// An element declared in the header.
#[derive(Debug)]
pub(crate) struct ElementDecl {
    pub(crate) element: Element,

    /// `false` if the element was excluded by the load options. Its rows
    /// still have to be walked to find the following elements.
    pub(crate) keep: bool,
}

/// Everything the header declares.
#[derive(Debug)]
pub(crate) struct Header {
    pub(crate) format: Format,
    pub(crate) version: f32,
    pub(crate) comments: Vec<String>,
    pub(crate) object_infos: Vec<ObjectInfo>,
    pub(crate) elements: Vec<ElementDecl>,

    /// Offset of the first byte after the `end_header` line.
    pub(crate) data_start: usize,
}

/// The position of the parser in the header grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingPly,
    InHeader,
    Done,
}

/// Parses the header at the start of `data`.
pub(crate) fn parse(data: &[u8], opts: &LoadOptions) -> Result<Header> {
    let mut lines = Lines::new(data);
    let mut state = State::AwaitingPly;
    let mut format = None;
    let mut header = Header {
        format: Format::Ascii,
        version: 1.0,
        comments: Vec::new(),
        object_infos: Vec::new(),
        elements: Vec::new(),
        data_start: 0,
    };

    // Index of the element that `property` lines belong to. `None` before
    // the first `element` line.
    let mut current = None;

    // Whether the `ply` line ends in `\r\n`. Only then is a `\r\n` after
    // `end_header` one terminator; otherwise the `\n` is body data.
    let mut crlf = false;

    while state != State::Done {
        let raw = match lines.next_raw() {
            Some(raw) => raw,
            None if state == State::AwaitingPly => {
                return Err(err!(MalformedHeader, "input is empty"));
            }
            None => return Err(err!(MalformedHeader, "unexpected end of input: 'end_header' missing")),
        };
        let line = util::trim(raw);
        if line.is_empty() {
            continue;
        }

        if line.len() > MAX_HEADER_LINE_LEN {
            return Err(err!(
                BoundsExceeded,
                "header line of {} bytes exceeds the maximum of {}",
                line.len(),
                MAX_HEADER_LINE_LEN,
            ));
        }

        if state == State::AwaitingPly {
            if line != b"ply" {
                return Err(err!(
                    MalformedHeader,
                    "expected magic 'ply', found {}",
                    util::debug_fmt_bytes(line, 20),
                ));
            }
            state = State::InHeader;
            crlf = data[..lines.pos()].ends_with(b"\r\n");
            continue;
        }

        if line == b"end_header" {
            state = State::Done;
        } else if line == b"ply" {
            return Err(err!(MalformedHeader, "'ply' is only allowed as the first line"));
        } else if let Some(rest) = util::strip_keyword(line, "format") {
            if format.is_some() {
                return Err(err!(MalformedHeader, "duplicate 'format' line"));
            }
            let (f, version) = parse_format(rest, opts)?;
            format = Some(f);
            header.version = version;
        } else if let Some(rest) = util::strip_keyword(util::trim_start(raw), "comment") {
            if opts.save_comments {
                header.comments.push(String::from_utf8_lossy(rest).into_owned());
            }
        } else if let Some(rest) = util::strip_keyword(line, "obj_info") {
            header.object_infos.push(parse_obj_info(rest)?);
        } else if let Some(rest) = util::strip_keyword(line, "element") {
            let element = parse_element(rest, &header.elements)?;
            let keep = opts.wants_element(&element.name);
            if !keep {
                debug!("skipping element '{}' (not requested)", element.name);
            }

            header.elements.push(ElementDecl { element, keep });
            current = Some(header.elements.len() - 1);
        } else if let Some(rest) = util::strip_keyword(line, "property") {
            let decl = match current {
                Some(i) => &mut header.elements[i],
                None => return Err(err!(MalformedHeader, "'property' line before any 'element' line")),
            };
            let prop = parse_property(rest)?;
            if decl.element.property_index_by_name(&prop.name).is_some() {
                return Err(err!(
                    MalformedHeader,
                    "duplicate property '{}' in element '{}'",
                    prop.name,
                    decl.element.name,
                ));
            }
            decl.element.properties.push(prop);
        } else {
            debug!("ignoring unknown header line {}", util::debug_fmt_bytes(line, 40));
        }
    }

    header.format = format.ok_or_else(|| err!(MalformedHeader, "'format' line missing"))?;
    header.data_start = lines.pos();
    if !crlf && data[..header.data_start].ends_with(b"\r\n") {
        header.data_start -= 1;
    }

    Ok(header)
}

/// Splits the next whitespace separated token off `s`.
fn next_token<'a>(s: &mut &'a [u8]) -> Option<&'a [u8]> {
    let rest = util::trim(s);
    if rest.is_empty() {
        *s = rest;
        return None;
    }

    let end = rest.iter().position(|&b| util::is_blank(b)).unwrap_or(rest.len());
    *s = &rest[end..];
    Some(&rest[..end])
}

fn check_name(name: &[u8]) -> Result<String> {
    if name.len() > MAX_NAME_LEN {
        return Err(err!(
            BoundsExceeded,
            "name {} is longer than {} bytes",
            util::debug_fmt_bytes(name, 40),
            MAX_NAME_LEN,
        ));
    }
    str::from_utf8(name).map(str::to_owned).map_err(|_| err!(
        MalformedHeader,
        "name {} is not valid UTF-8",
        util::debug_fmt_bytes(name, 40),
    ))
}

fn parse_format(mut rest: &[u8], opts: &LoadOptions) -> Result<(Format, f32)> {
    let name = next_token(&mut rest).ok_or_else(|| err!(MalformedHeader, "'format' without encoding"))?;
    let version = next_token(&mut rest).ok_or_else(|| err!(MalformedHeader, "'format' without version"))?;

    let format = Format::from_keyword(name).ok_or_else(|| err!(
        MalformedHeader,
        "unknown format {}",
        util::debug_fmt_bytes(name, 40),
    ))?;
    let version = str::from_utf8(version).ok()
        .and_then(|s| s.parse::<f32>().ok())
        .ok_or_else(|| err!(MalformedHeader, "invalid version {}", util::debug_fmt_bytes(version, 20)))?;

    if version != 1.0 && !opts.allow_any_version {
        return Err(crate::Error::UnsupportedVersion(version));
    }

    Ok((format, version))
}

fn parse_obj_info(mut rest: &[u8]) -> Result<ObjectInfo> {
    let name = next_token(&mut rest).ok_or_else(|| err!(MalformedHeader, "'obj_info' without name"))?;
    let value = next_token(&mut rest).ok_or_else(|| err!(MalformedHeader, "'obj_info' without value"))?;

    let name = check_name(name)?;
    let value = str::from_utf8(value).ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| err!(
            MalformedHeader,
            "invalid value {} for obj_info '{}'",
            util::debug_fmt_bytes(value, 20),
            name,
        ))?;

    Ok(ObjectInfo { name, value })
}

fn parse_element(mut rest: &[u8], existing: &[ElementDecl]) -> Result<Element> {
    let name = next_token(&mut rest).ok_or_else(|| err!(MalformedHeader, "'element' without name"))?;
    let count = next_token(&mut rest).ok_or_else(|| err!(MalformedHeader, "'element' without count"))?;

    let name = check_name(name)?;
    if existing.iter().any(|decl| decl.element.name == name) {
        return Err(err!(MalformedHeader, "duplicate element '{}'", name));
    }

    let count = str::from_utf8(count).ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| err!(
            MalformedHeader,
            "invalid row count {} for element '{}'",
            util::debug_fmt_bytes(count, 20),
            name,
        ))?;
    if count > u64::from(u32::max_value()) {
        return Err(err!(BoundsExceeded, "element '{}' declares {} rows", name, count));
    }

    Ok(Element::new(name, count as u32))
}

fn parse_property(mut rest: &[u8]) -> Result<Property> {
    let scalar = |token: Option<&[u8]>| -> Result<ScalarType> {
        let token = token.ok_or_else(|| err!(MalformedFile, "'property' line is missing tokens"))?;
        ScalarType::from_keyword(token).ok_or_else(|| err!(
            MalformedFile,
            "unknown scalar type {}",
            util::debug_fmt_bytes(token, 20),
        ))
    };

    let first = next_token(&mut rest);
    let ty = if first == Some(&b"list"[..]) {
        let len_type = scalar(next_token(&mut rest))?;
        let scalar_type = scalar(next_token(&mut rest))?;
        if !len_type.is_integer() {
            return Err(err!(
                MalformedHeader,
                "list count type must be an integer type, not {}",
                len_type,
            ));
        }

        PropertyType::List { len_type, scalar_type }
    } else {
        PropertyType::Scalar(scalar(first)?)
    };

    let name = next_token(&mut rest)
        .ok_or_else(|| err!(MalformedFile, "'property' line without a name"))?;

    Ok(Property::new(check_name(name)?, ty))
}
