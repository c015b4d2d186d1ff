use std::fs;

use ws281x_rpi::{
    errors::{Lpd8806Error, PixelError},
    ColorModel, ColorOrder, LedStrip, Lpd8806, Rgb, Rgbw,
};

#[test]
fn rgbw_strip_on_a_file() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let order: ColorOrder = "grbw".parse().unwrap();
    let model: ColorModel = "RGBW".parse().unwrap();
    let mut strip = Lpd8806::new(file.reopen().unwrap(), 33, model, 0, order).unwrap();

    // 33 pixels need two latch bytes.
    assert_eq!(fs::read(file.path()).unwrap(), [0, 0]);

    strip
        .set_rgbw_at(32, Rgbw::new(0x02, 0x04, 0x06, 0x08))
        .unwrap();
    strip.flush().unwrap();

    let written = fs::read(file.path()).unwrap();
    assert_eq!(written.len(), 2 + 33 * 4 + 2);
    let frame = &written[2..];
    assert!(frame[..32 * 4].iter().all(|&b| b == 0x80));
    assert_eq!(frame[32 * 4..33 * 4], [0x82, 0x81, 0x83, 0x84]);
    assert_eq!(frame[33 * 4..], [0, 0]);
}

#[test]
fn contract_violations_leave_the_strip_untouched() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut strip =
        Lpd8806::new(file.reopen().unwrap(), 2, ColorModel::Rgb, 0, ColorOrder::Rgb).unwrap();

    assert_eq!(
        strip.set_rgbs(&[Rgb::new(1, 2, 3)]),
        Err(PixelError::LengthMismatch {
            expected: 2,
            actual: 1
        })
    );
    assert_eq!(
        strip.set_rgb_at(2, Rgb::new(1, 2, 3)),
        Err(PixelError::IndexOutOfRange { index: 2, len: 2 })
    );
    assert!(strip.pixels().as_bytes().iter().all(|&b| b == 0));

    strip.close().unwrap();
    assert!(matches!(strip.flush(), Err(Lpd8806Error::StripClosed)));
}
