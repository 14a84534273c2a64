//! Export and import across both transport modes.

use fml_core::prelude::*;
use proptest::prelude::*;

mod common;

use common::{counts, every_kind, narrow, wide};

#[test]
fn every_kind_survives_both_modes() {
    let buf = every_kind();
    for mode in [ExportMode::Binary, ExportMode::TextSafe] {
        let bytes = buf.export(mode).unwrap();
        assert_eq!(ExportMode::detect(&bytes), mode);

        let back = Fml32::import(&bytes, mode).unwrap();
        assert_eq!(back, buf, "mode {}", mode);
        assert!(back.is_indexed());
        assert_eq!(back.get::<String>(wide("NAME"), 0).unwrap(), "hello");
        // Pointers cross the wire as plain addresses.
        assert_eq!(
            back.get::<PtrValue>(wide("PTR"), 0).unwrap().address,
            0xdead_beef
        );
    }
}

#[test]
fn text_safe_output_is_printable() {
    let bytes = every_kind().export(ExportMode::TextSafe).unwrap();
    assert!(bytes.iter().all(|b| b.is_ascii_graphic()));
}

#[test]
fn nested_buffer_comes_back_whole() {
    let bytes = every_kind().export(ExportMode::Binary).unwrap();
    let back = Fml32::import(&bytes, ExportMode::Binary).unwrap();

    let inner = back.get::<Fml32>(wide("SUB"), 0).unwrap();
    assert_eq!(inner.get::<i64>(wide("COUNT"), 0).unwrap(), 7);
    assert_eq!(inner.get::<String>(wide("NAME"), 0).unwrap(), "inner");
}

#[test]
fn narrow_buffers_round_trip() {
    let mut buf = Fml16::new();
    buf.add(narrow("NAME"), "short form").unwrap();
    buf.add(narrow("SHORTV"), 12i16).unwrap();
    buf.add(narrow("SHORTV"), -12i16).unwrap();

    let bytes = buf.export(ExportMode::TextSafe).unwrap();
    let back = Fml16::import(&bytes, ExportMode::TextSafe).unwrap();
    assert_eq!(back, buf);
    assert_eq!(back.count(narrow("SHORTV")), 2);

    assert!(matches!(
        Fml32::import(&bytes, ExportMode::TextSafe),
        Err(FmlError::Transport { .. })
    ));
}

#[test]
fn exported_size_fits_a_caller_buffer() {
    let buf = counts(&[1, 2, 3]);
    let needed = buf.export(ExportMode::Binary).unwrap().len();

    let mut dest = vec![0u8; needed];
    assert_eq!(buf.export_into(ExportMode::Binary, &mut dest).unwrap(), needed);
    assert_eq!(Fml32::import(&dest, ExportMode::Binary).unwrap(), buf);

    let mut short = vec![0u8; needed - 1];
    let err = buf.export_into(ExportMode::Binary, &mut short).unwrap_err();
    assert!(matches!(err, FmlError::SpaceExhausted { .. }));
}

#[test]
fn null_buffers_stay_null() {
    for mode in [ExportMode::Binary, ExportMode::TextSafe] {
        let bytes = Fml32::new().export(mode).unwrap();
        assert!(Fml32::import(&bytes, mode).unwrap().is_null(), "mode {}", mode);
    }
}

#[test]
fn empty_buffers_stay_allocated() {
    let empty = Fml32::with_capacity(256).unwrap();
    for mode in [ExportMode::Binary, ExportMode::TextSafe] {
        let back = Fml32::import(&empty.export(mode).unwrap(), mode).unwrap();
        assert!(!back.is_null(), "mode {}", mode);
        assert!(back.is_empty());
        assert_eq!(back, empty);
    }
}

#[test]
fn truncated_frames_are_rejected() {
    let bytes = counts(&[5, 6]).export(ExportMode::Binary).unwrap();
    for cut in [0, 3, bytes.len() / 2, bytes.len() - 1] {
        assert!(
            Fml32::import(&bytes[..cut], ExportMode::Binary).is_err(),
            "cut at {}",
            cut
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn export_then_import_is_identity(
        names in proptest::collection::vec("[a-z ]{0,12}", 0..6),
        numbers in proptest::collection::vec(any::<i64>(), 0..6),
        binary in any::<bool>(),
    ) {
        let mut buf = Fml32::with_capacity(0).unwrap();
        for name in &names {
            buf.add(wide("NAME"), name.as_str()).unwrap();
        }
        for n in &numbers {
            buf.add(wide("COUNT"), *n).unwrap();
        }

        let mode = if binary { ExportMode::Binary } else { ExportMode::TextSafe };
        let back = Fml32::import(&buf.export(mode).unwrap(), mode).unwrap();
        prop_assert_eq!(&back, &buf);
        prop_assert_eq!(back.checksum().unwrap(), buf.checksum().unwrap());
    }
}
