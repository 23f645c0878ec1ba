// encode.rs
//
// Copyright (c) 2019-2023  Douglas Lau
//
//! Byte formatting for GIF records
use crate::block::*;
use crate::sink::ByteSink;

/// Append one block to a sink
pub(crate) fn encode_block(w: &mut ByteSink, block: &Block) {
    use crate::block::Block::*;
    match block {
        Header(b) => b.format(w),
        LogicalScreenDesc(b) => b.format(w),
        GlobalColorTable(b) => b.format(w),
        GraphicControl(b) => b.format(w),
        Application(b) => b.format(w),
        ImageDesc(b) => b.format(w),
        LocalColorTable(b) => b.format(w),
        ImageData(b) => b.format(w),
        Trailer(b) => b.format(w),
    }
}

impl Header {
    fn format(&self, w: &mut ByteSink) {
        w.write_ascii("GIF");
        w.write_bytes(&self.version());
    }
}

impl LogicalScreenDesc {
    fn format(&self, w: &mut ByteSink) {
        w.write_u16_le(self.screen_width());
        w.write_u16_le(self.screen_height());
        w.write_byte(self.flags());
        w.write_byte(self.background_color_idx());
        w.write_byte(self.pixel_aspect_ratio());
    }
}

impl ColorTable {
    fn format(&self, w: &mut ByteSink) {
        w.write_bytes(self.colors());
    }
}

impl GraphicControl {
    fn format(&self, w: &mut ByteSink) {
        w.write_byte(BlockCode::Extension_.signature());
        w.write_byte(ExtensionCode::GraphicControl_.into());
        w.write_byte(4);    // block size
        w.write_byte(self.flags());
        w.write_u16_le(self.delay_time_cs());
        w.write_byte(self.transparent_color_idx());
        w.write_byte(0);    // block size
    }
}

impl Application {
    fn format(&self, w: &mut ByteSink) {
        w.write_byte(BlockCode::Extension_.signature());
        w.write_byte(ExtensionCode::Application_.into());
        for c in self.app_data() {
            assert!(c.len() < 256);
            w.write_byte(c.len() as u8);    // block size
            w.write_bytes(c);
        }
        w.write_byte(0);    // block size
    }
}

impl ImageDesc {
    fn format(&self, w: &mut ByteSink) {
        w.write_byte(BlockCode::ImageDesc_.signature());
        w.write_u16_le(self.left());
        w.write_u16_le(self.top());
        w.write_u16_le(self.width());
        w.write_u16_le(self.height());
        w.write_byte(self.flags());
    }
}

impl ImageData {
    fn format(&self, w: &mut ByteSink) {
        w.write_bytes(self.data());
    }
}

impl Trailer {
    fn format(&self, w: &mut ByteSink) {
        w.write_byte(BlockCode::Trailer_.signature());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn encoded(block: Block) -> Vec<u8> {
        let mut w = ByteSink::new();
        encode_block(&mut w, &block);
        w.into_inner()
    }

    #[test]
    fn header() {
        assert_eq!(encoded(Header::default().into()), b"GIF89a");
    }

    #[test]
    fn screen_desc() {
        let lsd = LogicalScreenDesc::default()
            .with_screen_width(0x0102)
            .with_screen_height(3)
            .with_color_table_config(&ColorTableConfig::full());
        assert_eq!(encoded(lsd.into()), [2, 1, 3, 0, 0xF7, 0, 0]);
    }

    #[test]
    fn graphic_control() {
        let mut gc = GraphicControl::default();
        gc.set_disposal_method(DisposalMethod::Background);
        gc.set_delay_time_cs(300);
        gc.set_transparent_color(Some(5));
        assert_eq!(encoded(gc.into()),
            [0x21, 0xF9, 4, 0b0000_1001, 0x2C, 0x01, 5, 0]);
    }

    #[test]
    fn netscape() {
        let mut expected = vec![0x21, 0xFF, 11];
        expected.extend_from_slice(b"NETSCAPE2.0");
        expected.extend_from_slice(&[3, 1, 5, 0, 0]);
        assert_eq!(encoded(Application::with_loop_count(5).into()), expected);
    }

    #[test]
    fn image_desc() {
        let desc = ImageDesc::default()
            .with_width(2)
            .with_height(0x0300)
            .with_color_table_config(&ColorTableConfig::full());
        assert_eq!(encoded(desc.into()), [0x2C, 0, 0, 0, 0, 2, 0, 0, 3, 0x87]);
    }

    #[test]
    fn trailer() {
        assert_eq!(encoded(Trailer::default().into()), [0x3B]);
    }
}
