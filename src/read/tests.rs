use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use failure::Error as AnyError;

use crate::{
    alloc::Budget,
    error::ErrorKind,
    scalar::{ScalarType, ScalarValue},
    scene::{DataType, Format, PropertyType, Scene},
    MAX_HEADER_LINE_LEN,
    MAX_NAME_LEN,
};
use super::*;


fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn load_str(src: &str) -> Result<Scene> {
    init_logger();
    load(src.as_bytes(), &LoadOptions::new())
}

fn kind_of(res: Result<Scene>) -> ErrorKind {
    match res {
        Ok(scene) => panic!("expected an error, but loading succeeded: {:#?}", scene),
        Err(e) => e.kind(),
    }
}

/// Checks that rows and values of every element lie within the element's
/// region and that the row sizes add up to the element size.
fn assert_consistent(scene: &Scene) {
    let mut next_start = 0;
    for element in scene.elements() {
        assert_eq!(element.data_start, next_start);
        next_start += element.data_size;
        if element.properties.is_empty() {
            continue;
        }

        let rows = element.row_begins();
        assert_eq!(rows.len(), element.row_count() as usize);
        assert!(rows.is_empty() || rows[0] == 0);
        for w in rows.windows(2) {
            assert!(w[0] <= w[1]);
        }

        for prop in element.properties() {
            assert_eq!(prop.row_offsets().len(), rows.len());
            for (row, &offset) in prop.row_offsets().iter().enumerate() {
                let size = match prop.ty() {
                    PropertyType::Scalar(ty) => ty.size() as u64,
                    PropertyType::List { len_type, .. } => len_type.size() as u64,
                };
                assert!(offset as u64 + size <= element.data_size() - rows[row]);
            }
        }
    }
    assert_eq!(next_start, scene.data().len() as u64);
}


// ===========================================================================
// ===== Header
// ===========================================================================

#[test]
fn three_floats() -> std::result::Result<(), AnyError> {
    let scene = load_str("\
        ply\n\
        format ascii 1.0\n\
        element vertex 2\n\
        property float x\n\
        property float y\n\
        property float z\n\
        end_header\n\
        0 0 0\n\
        1 1 1\n\
    ")?;

    assert_eq!(scene.format(), Format::Ascii);
    assert_eq!(scene.elements().len(), 1);

    let vertex = scene.element("vertex").unwrap();
    assert_eq!(vertex.row_count(), 2);
    assert_eq!(vertex.properties().len(), 3);
    for prop in vertex.properties() {
        assert_eq!(prop.data_type(), DataType::Scalar);
        assert_eq!(prop.scalar_type(), ScalarType::Float);
        assert_eq!(prop.list_count_type(), None);
    }
    assert_eq!(vertex.scalar(1, 0)?, ScalarValue::Float(1.0));
    assert_eq!(vertex.scalar_f64(0, 2)?, 0.0);
    assert_eq!(vertex.data().len(), 24);
    assert_consistent(&scene);

    Ok(())
}

#[test]
fn comments_and_obj_info() -> std::result::Result<(), AnyError> {
    init_logger();
    let src = b"\
        ply\n\
        format ascii 1.0\n\
        comment made by hand\n\
        obj_info scale 2.5\n\
        comment\n\
        element vertex 0\n\
        property double x\n\
        end_header\n";

    let scene = load(src, &LoadOptions::new().save_comments(true))?;
    assert_eq!(scene.comments(), ["made by hand", ""]);
    assert_eq!(scene.object_infos().len(), 1);
    assert_eq!(scene.object_infos()[0].name, "scale");
    assert_eq!(scene.object_infos()[0].value, 2.5);

    let scene = load(src, &LoadOptions::new())?;
    assert!(scene.comments().is_empty());
    assert_eq!(scene.element("vertex").unwrap().row_count(), 0);

    Ok(())
}

#[test]
fn line_endings_and_whitespace() -> std::result::Result<(), AnyError> {
    let scene = load_str(
        "ply\r\n  format   ascii 1.0\r\n\r\nelement\tpoint 2\rproperty uchar v\n\
         end_header\r\n3\r\n\r\n  4  \n"
    )?;

    let point = scene.element("point").unwrap();
    assert_eq!(point.scalar(0, 0)?, ScalarValue::UChar(3));
    assert_eq!(point.scalar(1, 0)?, ScalarValue::UChar(4));
    Ok(())
}

#[test]
fn type_aliases() -> std::result::Result<(), AnyError> {
    let scene = load_str("\
        ply\n\
        format ascii 1.0\n\
        element vertex 1\n\
        property float32 x\n\
        property uint8 r\n\
        property list uint8 int32 idx\n\
        end_header\n\
        1.5 200 2 -1 7\n\
    ")?;

    let vertex = scene.element("vertex").unwrap();
    let types: Vec<_> = vertex.properties().iter().map(|p| p.ty()).collect();
    assert_eq!(types, [
        PropertyType::Scalar(ScalarType::Float),
        PropertyType::Scalar(ScalarType::UChar),
        PropertyType::List { len_type: ScalarType::UChar, scalar_type: ScalarType::Int },
    ]);
    assert_eq!(vertex.list(0, 2)?.to_f64_vec(), [-1.0, 7.0]);
    Ok(())
}

#[test]
fn unknown_keywords_are_ignored() -> std::result::Result<(), AnyError> {
    let scene = load_str("\
        ply\n\
        format ascii 1.0\n\
        made_up_keyword 1 2 3\n\
        element vertex 1\n\
        property int x\n\
        end_header\n\
        5\n\
    ")?;
    assert_eq!(scene.element("vertex").unwrap().scalar(0, 0)?, ScalarValue::Int(5));
    Ok(())
}

#[test]
fn version() -> std::result::Result<(), AnyError> {
    init_logger();
    let src = b"ply\nformat ascii 2.0\nelement v 1\nproperty int x\nend_header\n1\n";

    let e = load(src, &LoadOptions::new()).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::UnsupportedVersion);

    let scene = load(src, &LoadOptions::new().allow_any_version(true))?;
    assert_eq!(scene.version(), 2.0);
    Ok(())
}

#[test]
fn malformed_headers() {
    let cases: &[(&str, ErrorKind)] = &[
        ("", ErrorKind::MalformedHeader),
        ("\n\n  \n", ErrorKind::MalformedHeader),
        ("plyx\nformat ascii 1.0\nend_header\n", ErrorKind::MalformedHeader),
        ("format ascii 1.0\nend_header\n", ErrorKind::MalformedHeader),
        ("ply\nformat ascii 1.0\n", ErrorKind::MalformedHeader),
        ("ply\nply\nformat ascii 1.0\nend_header\n", ErrorKind::MalformedHeader),
        ("ply\nend_header\n", ErrorKind::MalformedHeader),
        ("ply\nformat ebcdic 1.0\nend_header\n", ErrorKind::MalformedHeader),
        ("ply\nformat ascii\nend_header\n", ErrorKind::MalformedHeader),
        ("ply\nformat ascii 1.0\nobj_info x\nend_header\n", ErrorKind::MalformedHeader),
        ("ply\nformat ascii 1.0\nobj_info x y\nend_header\n", ErrorKind::MalformedHeader),
        ("ply\nformat ascii 1.0\nelement v\nend_header\n", ErrorKind::MalformedHeader),
        ("ply\nformat ascii 1.0\nelement v -1\nend_header\n", ErrorKind::MalformedHeader),
        ("ply\nformat ascii 1.0\nelement v 5000000000\nend_header\n", ErrorKind::BoundsExceeded),
        ("ply\nformat ascii 1.0\nproperty int x\nend_header\n", ErrorKind::MalformedHeader),
        ("ply\nformat ascii 1.0\nelement v 0\nelement v 0\nend_header\n", ErrorKind::MalformedHeader),
        (
            "ply\nformat ascii 1.0\nelement v 0\nproperty int x\nproperty float x\nend_header\n",
            ErrorKind::MalformedHeader,
        ),
        ("ply\nformat ascii 1.0\nelement v 0\nproperty long x\nend_header\n", ErrorKind::MalformedFile),
        ("ply\nformat ascii 1.0\nelement v 0\nproperty int\nend_header\n", ErrorKind::MalformedFile),
        ("ply\nformat ascii 1.0\nelement v 0\nproperty list uchar\nend_header\n", ErrorKind::MalformedFile),
        (
            "ply\nformat ascii 1.0\nelement v 0\nproperty list float int x\nend_header\n",
            ErrorKind::MalformedHeader,
        ),
    ];

    for (src, kind) in cases {
        assert_eq!(kind_of(load_str(src)), *kind, "input: {:?}", src);
    }
}

#[test]
fn long_names() {
    let name = "n".repeat(MAX_NAME_LEN);
    let ok = format!("ply\nformat ascii 1.0\nelement {} 0\nend_header\n", name);
    assert!(load_str(&ok).is_ok());

    let long = format!("ply\nformat ascii 1.0\nelement {}n 0\nend_header\n", name);
    assert_eq!(kind_of(load_str(&long)), ErrorKind::BoundsExceeded);

    let long = format!("ply\nformat ascii 1.0\nelement v 0\nproperty int {}n\nend_header\n", name);
    assert_eq!(kind_of(load_str(&long)), ErrorKind::BoundsExceeded);
}

#[test]
fn non_utf8_names() {
    init_logger();
    let cases: &[&[u8]] = &[
        b"ply\nformat ascii 1.0\nelement \xff 0\nelement \xfe 0\nend_header\n",
        b"ply\nformat ascii 1.0\nelement v 0\nproperty int \xff\nend_header\n",
        b"ply\nformat ascii 1.0\nobj_info \xc3 1\nend_header\n",
    ];
    for src in cases {
        let e = load(src, &LoadOptions::new()).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::MalformedHeader, "input: {:?}", src);
        assert!(e.to_string().contains("UTF-8"), "input: {:?}, error: {}", src, e);
    }
}

#[test]
fn long_header_line() {
    let src = format!("ply\ncomment {}\nformat ascii 1.0\nend_header\n", "x".repeat(MAX_HEADER_LINE_LEN));
    assert_eq!(kind_of(load_str(&src)), ErrorKind::BoundsExceeded);
}


// ===========================================================================
// ===== ASCII data
// ===========================================================================

const FACE_HEADER: &str = "\
    ply\n\
    format ascii 1.0\n\
    element face 1\n\
    property list uchar int vertex_indices\n\
    end_header\n";

#[test]
fn list_property() -> std::result::Result<(), AnyError> {
    let scene = load_str(&format!("{}3 0 1 2\n", FACE_HEADER))?;
    let face = scene.element("face").unwrap();

    let list = face.list(0, 0)?;
    assert_eq!(list.len(), 3);
    assert_eq!(&list[..], [ScalarValue::Int(0), ScalarValue::Int(1), ScalarValue::Int(2)]);
    assert_eq!(face.data().len(), 1 + 3 * 4);
    assert_consistent(&scene);
    Ok(())
}

#[test]
fn list_too_short() {
    let res = load_str(&format!("{}4 0 1 2\n", FACE_HEADER));
    assert_eq!(kind_of(res), ErrorKind::ListCountMismatch);
}

#[test]
fn bad_rows() {
    let header = "ply\nformat ascii 1.0\nelement v 2\nproperty int a\nproperty int b\nend_header\n";
    let cases: &[(&str, ErrorKind)] = &[
        // missing value
        ("1 2\n3\n", ErrorKind::MalformedData),
        // extra value
        ("1 2\n3 4 5\n", ErrorKind::MalformedData),
        // missing row
        ("1 2\n", ErrorKind::MalformedData),
        // not an integer
        ("1 2\n3 x\n", ErrorKind::DataTypeMismatch),
        ("1 2\n3 4.5\n", ErrorKind::DataTypeMismatch),
    ];
    for (data, kind) in cases {
        let src = format!("{}{}", header, data);
        assert_eq!(kind_of(load_str(&src)), *kind, "data: {:?}", data);
    }

    let negative = "ply\nformat ascii 1.0\nelement f 1\nproperty list char int i\nend_header\n-1\n";
    assert_eq!(kind_of(load_str(negative)), ErrorKind::MalformedData);

    let overflow = "ply\nformat ascii 1.0\nelement f 1\nproperty uchar c\nend_header\n256\n";
    assert_eq!(kind_of(load_str(overflow)), ErrorKind::DataTypeMismatch);
}

#[test]
fn row_count_is_checked_against_input() {
    // Would need a lot of memory for the offset tables if the count was
    // trusted.
    let src = "ply\nformat ascii 1.0\nelement v 4000000000\nproperty int a\nend_header\n1\n";
    assert_eq!(kind_of(load_str(src)), ErrorKind::MalformedData);
}

#[test]
fn empty_elements() -> std::result::Result<(), AnyError> {
    let scene = load_str("\
        ply\n\
        format ascii 1.0\n\
        element nothing 0\n\
        property int a\n\
        element marker 3\n\
        element v 1\n\
        property short s\n\
        end_header\n\
        -7\n\
        trailing garbage is ignored\n\
    ")?;

    assert_eq!(scene.elements().len(), 3);
    assert_eq!(scene.element("nothing").unwrap().row_count(), 0);
    assert_eq!(scene.element("marker").unwrap().row_count(), 3);
    assert_eq!(scene.element("marker").unwrap().data().len(), 0);
    assert_eq!(scene.element("v").unwrap().scalar(0, 0)?, ScalarValue::Short(-7));
    assert_consistent(&scene);
    Ok(())
}

#[test]
fn only_some_elements() -> std::result::Result<(), AnyError> {
    init_logger();
    let src = b"\
        ply\n\
        format ascii 1.0\n\
        element vertex 3\n\
        property float x\n\
        element face 1\n\
        property list uchar int vertex_indices\n\
        property uchar flags\n\
        element edge 1\n\
        property int a\n\
        end_header\n\
        0.5\n\
        1.5\n\
        2.5\n\
        3 0 1 2 9\n\
        2\n";

    let scene = load(src, &LoadOptions::new().only_elements(&["vertex"]))?;
    assert_eq!(scene.elements().len(), 1);
    let vertex = scene.element("vertex").unwrap();
    assert_eq!(vertex.scalar(2, 0)?, ScalarValue::Float(2.5));
    assert!(scene.element("face").is_none());

    // Elements after a skipped one are still found.
    let scene = load(src, &LoadOptions::new().only_elements(&["edge"]))?;
    assert_eq!(scene.elements().len(), 1);
    assert_eq!(scene.element("edge").unwrap().scalar(0, 0)?, ScalarValue::Int(2));
    assert_eq!(scene.data().len(), 4);
    assert_consistent(&scene);

    // Skipped elements are still validated.
    let broken = String::from_utf8_lossy(src).replace("3 0 1 2 9", "3 0 1");
    let e = load(broken.as_bytes(), &LoadOptions::new().only_elements(&["vertex"])).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ListCountMismatch);

    Ok(())
}

#[test]
fn accessor_errors() -> std::result::Result<(), AnyError> {
    let scene = load_str(&format!("{}3 0 1 2\n", FACE_HEADER))?;
    let face = scene.element("face").unwrap();

    assert_eq!(face.scalar(0, 0).unwrap_err().kind(), ErrorKind::DataTypeMismatch);
    assert_eq!(face.list(1, 0).unwrap_err().kind(), ErrorKind::BoundsExceeded);
    assert_eq!(face.value(0, 1).unwrap_err().kind(), ErrorKind::BoundsExceeded);
    assert_eq!(face.value_by_name(0, "nope").unwrap_err().kind(), ErrorKind::BoundsExceeded);
    assert!(face.value_by_name(0, "vertex_indices")?.as_list().is_some());
    Ok(())
}

#[test]
fn property_lookup() -> std::result::Result<(), AnyError> {
    let scene = load_str("\
        ply\n\
        format ascii 1.0\n\
        element vertex 1\n\
        property float x\n\
        property float y\n\
        end_header\n\
        1 2\n\
    ")?;
    let vertex = &scene.elements()[0];

    let y = &vertex.properties()[1];
    assert_eq!(vertex.property_index(y), Some(1));
    assert_eq!(vertex.property_index_by_name("y"), Some(1));
    assert_eq!(vertex.property("x").map(|p| p.name()), Some("x"));

    // Lookup is by identity: an equal property from elsewhere is not found.
    let copy = y.clone();
    assert_eq!(&copy, y);
    assert_eq!(vertex.property_index(&copy), None);
    assert_eq!(vertex.property_index_by_name("z"), None);
    Ok(())
}


// ===========================================================================
// ===== Binary data
// ===========================================================================

fn binary_file(format: &str) -> std::result::Result<Vec<u8>, AnyError> {
    let mut out = format!("\
        ply\n\
        format {} 1.0\n\
        element vertex 2\n\
        property float x\n\
        property ushort id\n\
        element face 1\n\
        property list uchar int vertex_indices\n\
        end_header\n",
        format,
    ).into_bytes();

    if format == "binary_little_endian" {
        out.write_f32::<LittleEndian>(1.5)?;
        out.write_u16::<LittleEndian>(7)?;
        out.write_f32::<LittleEndian>(-2.0)?;
        out.write_u16::<LittleEndian>(300)?;
        out.write_u8(3)?;
        for i in &[0, 1, 70000] {
            out.write_i32::<LittleEndian>(*i)?;
        }
    } else {
        out.write_f32::<BigEndian>(1.5)?;
        out.write_u16::<BigEndian>(7)?;
        out.write_f32::<BigEndian>(-2.0)?;
        out.write_u16::<BigEndian>(300)?;
        out.write_u8(3)?;
        for i in &[0, 1, 70000] {
            out.write_i32::<BigEndian>(*i)?;
        }
    }

    Ok(out)
}

fn check_binary_scene(scene: &Scene) -> std::result::Result<(), AnyError> {
    let vertex = scene.element("vertex").unwrap();
    assert_eq!(vertex.scalar(0, 0)?, ScalarValue::Float(1.5));
    assert_eq!(vertex.scalar(0, 1)?, ScalarValue::UShort(7));
    assert_eq!(vertex.scalar(1, 0)?, ScalarValue::Float(-2.0));
    assert_eq!(vertex.scalar(1, 1)?, ScalarValue::UShort(300));

    let face = scene.element("face").unwrap();
    assert_eq!(face.list(0, 0)?.to_f64_vec(), [0.0, 1.0, 70000.0]);
    assert_consistent(scene);
    Ok(())
}

#[test]
fn binary_both_endians() -> std::result::Result<(), AnyError> {
    init_logger();
    for format in &["binary_little_endian", "binary_big_endian"] {
        let scene = load(&binary_file(format)?, &LoadOptions::new())?;
        check_binary_scene(&scene)?;
    }
    Ok(())
}

#[test]
fn declared_endianness_is_applied() -> std::result::Result<(), AnyError> {
    init_logger();
    let le = binary_file("binary_little_endian")?;
    let as_be = String::from_utf8_lossy(&le[..60])
        .replacen("binary_little_endian", "binary_big_endian   ", 1);
    assert_eq!(as_be.len(), 60);

    // Same data bytes, different declared byte order. The header keeps its
    // length thanks to the padding after the format name.
    let mut be = as_be.into_bytes();
    be.extend_from_slice(&le[60..]);

    let a = load(&le, &LoadOptions::new().only_elements(&["vertex"]))?;
    let b = load(&be, &LoadOptions::new().only_elements(&["vertex"]))?;
    let va = a.element("vertex").unwrap();
    let vb = b.element("vertex").unwrap();
    assert_eq!(va.scalar(1, 1)?, ScalarValue::UShort(300));
    assert_eq!(vb.scalar(1, 1)?, ScalarValue::UShort(300u16.swap_bytes()));
    assert_ne!(va.scalar(0, 0)?, vb.scalar(0, 0)?);
    Ok(())
}

#[test]
fn body_starting_with_newline_byte() -> std::result::Result<(), AnyError> {
    init_logger();
    let header = "ply\nformat binary_little_endian 1.0\nelement v 1\n\
        property uchar a\nproperty uchar b\nend_header";

    // With `\n` line ends, only the `\r` terminates `end_header` and the
    // `\n` after it is the first body byte.
    let mut lf = header.as_bytes().to_vec();
    lf.extend_from_slice(&[b'\r', 0x0A, 0x07]);

    // With `\r\n` line ends, the pair is one terminator.
    let mut crlf = header.replace('\n', "\r\n").into_bytes();
    crlf.extend_from_slice(&[b'\r', b'\n', 0x0A, 0x07]);

    for src in &[lf, crlf] {
        let scene = load(src, &LoadOptions::new())?;
        let v = scene.element("v").unwrap();
        assert_eq!(v.scalar(0, 0)?, ScalarValue::UChar(10));
        assert_eq!(v.scalar(0, 1)?, ScalarValue::UChar(7));
    }
    Ok(())
}

#[test]
fn binary_truncated() -> std::result::Result<(), AnyError> {
    init_logger();
    let full = binary_file("binary_little_endian")?;
    for cut in 1..=12 {
        let data = &full[..full.len() - cut];
        let e = load(data, &LoadOptions::new()).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::MalformedData, "cut {} bytes", cut);
    }
    Ok(())
}

#[test]
fn huge_list_count() -> std::result::Result<(), AnyError> {
    init_logger();
    let mut src = b"\
        ply\n\
        format binary_little_endian 1.0\n\
        element face 1\n\
        property list uint double values\n\
        end_header\n".to_vec();
    src.write_u32::<LittleEndian>(0xFFFF_FFFF)?;
    src.extend_from_slice(&[0; 16]);

    let e = load(&src, &LoadOptions::new()).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::BoundsExceeded);
    Ok(())
}

#[test]
fn allocation_failure() -> std::result::Result<(), AnyError> {
    init_logger();
    let src = binary_file("binary_big_endian")?;

    let e = load_with(&src, &LoadOptions::new(), &Budget::new(16)).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::AllocationFailed);

    let budget = Budget::new(4096);
    let scene = load_with(&src, &LoadOptions::new(), &budget)?;
    check_binary_scene(&scene)?;
    assert!(budget.used() >= scene.data().len() as u64);
    Ok(())
}

#[test]
fn missing_file() {
    let e = load_file("/this/path/does/not/exist.ply", &LoadOptions::new()).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::FileReadError);
}
