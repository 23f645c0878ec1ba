// cargo fuzz run encode corpus/encode -- -timeout=30

#![no_main]

use libfuzzer_sys::fuzz_target;

use recgif::{Builder, Threading};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let width = u32::from(data[0] % 32) + 1;
    let quality = u32::from(data[1]);
    let pixels = &data[2..];
    let height = (pixels.len() / (width as usize * 4)).min(32) as u32;
    let mut writer = match Builder::default()
        .with_width(width)
        .with_height(height)
        .with_quality(quality)
        .with_transparent_color(Some((0, 0, 0)))
        .with_threading(Threading::Inline)
        .build()
    {
        Ok(w) => w,
        Err(_) => return,
    };
    let len = (width * height * 4) as usize;
    writer.encode_frame(pixels[..len].to_vec()).unwrap();
    let gif = writer.finish().unwrap();
    assert_eq!(gif.as_bytes().last(), Some(&0x3B));
});
