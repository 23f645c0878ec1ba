// block.rs
//
// Copyright (c) 2019-2023  Douglas Lau
//
//! GIF records written by the encoder

/// Number of channels in a color table entry
const CHANNELS: usize = 3;

/// Number of entries in every color table written
pub const TABLE_LEN: usize = 256;

/// Size of every color table written, in bytes
pub const TABLE_SZ: usize = TABLE_LEN * CHANNELS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorTableExistence {
    Absent,
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTableConfig {
    existence: ColorTableExistence,
    table_len: usize,   // must be between 2...256
}

impl ColorTableConfig {
    pub fn new(existence: ColorTableExistence, table_len: u16) -> Self {
        let table_len = (table_len as usize).max(2).next_power_of_two().min(256);
        ColorTableConfig { existence, table_len }
    }
    /// Config for a full, unsorted 256-entry table
    pub fn full() -> Self {
        Self::new(ColorTableExistence::Present, TABLE_LEN as u16)
    }
    fn len_bits(&self) -> u8 {
        let sz = self.table_len;
        for b in 0..7 {
            if (sz >> (b + 1)) == 1 {
                return b;
            }
        }
        7
    }
}

/// Frame disposal method
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DisposalMethod {
    NoAction,
    Keep,
    Background,
    Previous,
    Reserved(u8),
}

impl Default for DisposalMethod {
    fn default() -> Self {
        DisposalMethod::NoAction
    }
}

impl From<u8> for DisposalMethod {
    fn from(n: u8) -> Self {
        use self::DisposalMethod::*;
        match n & 0b0111 {
            0 => NoAction,
            1 => Keep,
            2 => Background,
            3 => Previous,
            _ => Reserved(n & 0b0111),
        }
    }
}

impl From<DisposalMethod> for u8 {
    fn from(d: DisposalMethod) -> Self {
        use self::DisposalMethod::*;
        match d {
            NoAction => 0,
            Keep => 1,
            Background => 2,
            Previous => 3,
            Reserved(n) => n & 0b0111,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum BlockCode {
    Extension_,
    ImageDesc_,
    Trailer_,
}

impl BlockCode {
    pub fn signature(self) -> u8 {
        use self::BlockCode::*;
        match self {
            ImageDesc_ => b',', // (0x2C) Image separator
            Extension_ => b'!', // (0x21) Extension introducer
            Trailer_ => b';',   // (0x3B) GIF trailer
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ExtensionCode {
    GraphicControl_,
    Application_,
}

impl From<ExtensionCode> for u8 {
    fn from(t: ExtensionCode) -> Self {
        use self::ExtensionCode::*;
        match t {
            GraphicControl_ => 0xF9,
            Application_ => 0xFF,
        }
    }
}

#[derive(Debug)]
pub struct Header {
    version: [u8; 3],
}

impl Default for Header {
    fn default() -> Self {
        Header { version: *b"89a" }
    }
}

impl Header {
    pub fn version(&self) -> [u8; 3] {
        self.version
    }
}

#[derive(Debug, Default)]
pub struct LogicalScreenDesc {
    screen_width: u16,
    screen_height: u16,
    flags: u8,
    background_color_idx: u8,   // index into global color table
    pixel_aspect_ratio: u8,
}

impl LogicalScreenDesc {
    const COLOR_TABLE_PRESENT: u8  = 0b1000_0000;
    const COLOR_RESOLUTION: u8     = 0b0111_0000;
    const COLOR_TABLE_SIZE: u8     = 0b0000_0111;

    pub fn with_screen_width(mut self, screen_width: u16) -> Self {
        self.screen_width = screen_width;
        self
    }
    pub fn screen_width(&self) -> u16 {
        self.screen_width
    }
    pub fn with_screen_height(mut self, screen_height: u16) -> Self {
        self.screen_height = screen_height;
        self
    }
    pub fn screen_height(&self) -> u16 {
        self.screen_height
    }
    pub fn flags(&self) -> u8 {
        self.flags
    }
    pub fn with_color_table_config(mut self, tbl: &ColorTableConfig) -> Self {
        let mut flags = tbl.len_bits() & Self::COLOR_TABLE_SIZE;
        flags |= (flags << 4) & Self::COLOR_RESOLUTION;
        if tbl.existence == ColorTableExistence::Present {
            flags |= Self::COLOR_TABLE_PRESENT;
        }
        self.flags = flags;
        self
    }
    pub fn background_color_idx(&self) -> u8 {
        self.background_color_idx
    }
    pub fn pixel_aspect_ratio(&self) -> u8 {
        self.pixel_aspect_ratio
    }
}

/// Global or local color table, always padded to 256 entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    colors: Vec<u8>,
}

impl ColorTable {
    pub fn with_colors(colors: &[u8]) -> Self {
        assert_eq!(colors.len() / CHANNELS * CHANNELS, colors.len());
        let mut colors = colors[..colors.len().min(TABLE_SZ)].to_vec();
        colors.resize(TABLE_SZ, 0);
        ColorTable { colors }
    }
    pub fn colors(&self) -> &[u8] {
        &self.colors
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GraphicControl {
    flags: u8,
    delay_time_cs: u16,      // delay in centiseconds (hundredths of a second)
    transparent_color_idx: u8,
}

impl GraphicControl {
    const DISPOSAL_METHOD: u8   = 0b0001_1100;
    const TRANSPARENT_COLOR: u8 = 0b0000_0001;

    pub fn flags(&self) -> u8 {
        self.flags
    }
    pub fn set_disposal_method(&mut self, disposal_method: DisposalMethod) {
        let d: u8 = disposal_method.into();
        self.flags = (self.flags & !Self::DISPOSAL_METHOD) | (d << 2);
    }
    pub fn delay_time_cs(&self) -> u16 {
        self.delay_time_cs
    }
    pub fn set_delay_time_cs(&mut self, delay_time_cs: u16) {
        self.delay_time_cs = delay_time_cs;
    }
    pub fn transparent_color_idx(&self) -> u8 {
        self.transparent_color_idx
    }
    pub fn set_transparent_color(&mut self, transparent_color: Option<u8>) {
        match transparent_color {
            Some(t) => {
                self.flags |= Self::TRANSPARENT_COLOR;
                self.transparent_color_idx = t;
            },
            None => {
                self.flags &= !Self::TRANSPARENT_COLOR;
                self.transparent_color_idx = 0;
            },
        }
    }
}

/// NETSCAPE2.0 looping extension
#[derive(Debug)]
pub struct Application {
    app_data: Vec<Vec<u8>>,     // sequence of sub-blocks
}

impl Application {
    pub fn with_loop_count(loop_count: u16) -> Self {
        let mut app_data = vec![];
        app_data.push(b"NETSCAPE2.0".to_vec());
        let mut v = vec![1];
        v.extend_from_slice(&loop_count.to_le_bytes());
        app_data.push(v);
        Application { app_data }
    }
    pub fn app_data(&self) -> &[Vec<u8>] {
        &self.app_data
    }
}

#[derive(Debug, Default)]
pub struct ImageDesc {
    left: u16,
    top: u16,
    width: u16,
    height: u16,
    flags: u8,
}

impl ImageDesc {
    const COLOR_TABLE_PRESENT: u8  = 0b1000_0000;
    const COLOR_TABLE_SIZE: u8     = 0b0000_0111;

    pub fn left(&self) -> u16 {
        self.left
    }
    pub fn top(&self) -> u16 {
        self.top
    }
    pub fn with_width(mut self, width: u16) -> Self {
        self.width = width;
        self
    }
    pub fn width(&self) -> u16 {
        self.width
    }
    pub fn with_height(mut self, height: u16) -> Self {
        self.height = height;
        self
    }
    pub fn height(&self) -> u16 {
        self.height
    }
    pub fn flags(&self) -> u8 {
        self.flags
    }
    pub fn with_color_table_config(mut self, tbl: &ColorTableConfig) -> Self {
        let mut flags = 0;
        if tbl.existence == ColorTableExistence::Present {
            flags |= Self::COLOR_TABLE_PRESENT;
            flags |= tbl.len_bits() & Self::COLOR_TABLE_SIZE;
        }
        self.flags = flags;
        self
    }
}

/// Compressed image data: minimum code size, sub-blocks and terminator
#[derive(Debug)]
pub struct ImageData {
    data: Vec<u8>,
}

impl ImageData {
    pub fn with_compressed(data: Vec<u8>) -> Self {
        ImageData { data }
    }
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug, Default)]
pub struct Trailer { }

#[derive(Debug)]
pub enum Block {
    Header(Header),
    LogicalScreenDesc(LogicalScreenDesc),
    GlobalColorTable(ColorTable),
    GraphicControl(GraphicControl),
    Application(Application),
    ImageDesc(ImageDesc),
    LocalColorTable(ColorTable),
    ImageData(ImageData),
    Trailer(Trailer),
}

impl From<Header> for Block {
    fn from(b: Header) -> Self {
        Block::Header(b)
    }
}

impl From<LogicalScreenDesc> for Block {
    fn from(b: LogicalScreenDesc) -> Self {
        Block::LogicalScreenDesc(b)
    }
}

impl From<GraphicControl> for Block {
    fn from(b: GraphicControl) -> Self {
        Block::GraphicControl(b)
    }
}

impl From<Application> for Block {
    fn from(b: Application) -> Self {
        Block::Application(b)
    }
}

impl From<ImageDesc> for Block {
    fn from(b: ImageDesc) -> Self {
        Block::ImageDesc(b)
    }
}

impl From<ImageData> for Block {
    fn from(b: ImageData) -> Self {
        Block::ImageData(b)
    }
}

impl From<Trailer> for Block {
    fn from(b: Trailer) -> Self {
        Block::Trailer(b)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn color_table_len() {
        let t = ColorTableConfig::new(ColorTableExistence::Present, 0); // 0-2
        assert_eq!(t.len_bits(), 0);
        let t = ColorTableConfig::new(ColorTableExistence::Present, 7); // 5-8
        assert_eq!(t.len_bits(), 2);
        let t = ColorTableConfig::new(ColorTableExistence::Present, 130);
        assert_eq!(t.len_bits(), 7);
        assert_eq!(ColorTableConfig::full().len_bits(), 7);
    }

    #[test]
    fn screen_flags() {
        let lsd = LogicalScreenDesc::default()
            .with_color_table_config(&ColorTableConfig::full());
        assert_eq!(lsd.flags(), 0xF7);
        let t = ColorTableConfig::new(ColorTableExistence::Absent, 256);
        let lsd = LogicalScreenDesc::default().with_color_table_config(&t);
        assert_eq!(lsd.flags(), 0x77);
    }

    #[test]
    fn image_desc_flags() {
        assert_eq!(ImageDesc::default().flags(), 0);
        let later = ImageDesc::default()
            .with_color_table_config(&ColorTableConfig::full());
        assert_eq!(later.flags(), 0x87);
        let t = ColorTableConfig::new(ColorTableExistence::Absent, 256);
        assert_eq!(later.with_color_table_config(&t).flags(), 0);
    }

    #[test]
    fn graphic_control_flags() {
        let mut gc = GraphicControl::default();
        gc.set_disposal_method(DisposalMethod::Previous);
        gc.set_disposal_method(DisposalMethod::Background);
        gc.set_transparent_color(Some(9));
        assert_eq!(gc.flags(), 0b0000_1001);
        assert_eq!(gc.transparent_color_idx(), 9);
        gc.set_transparent_color(None);
        assert_eq!(gc.flags(), 0b0000_1000);
        assert_eq!(gc.transparent_color_idx(), 0);
    }

    #[test]
    fn disposal_codes() {
        assert_eq!(DisposalMethod::from(2), DisposalMethod::Background);
        assert_eq!(u8::from(DisposalMethod::from(13)), 5);
    }

    #[test]
    fn loop_count() {
        let b = Application::with_loop_count(0x0104);
        assert_eq!(b.app_data()[0], b"NETSCAPE2.0");
        assert_eq!(b.app_data()[1], vec![1, 0x04, 0x01]);
    }

    #[test]
    fn color_table_padding() {
        let t = ColorTable::with_colors(&[1, 2, 3]);
        assert_eq!(t.colors().len(), TABLE_SZ);
        assert_eq!(&t.colors()[..4], &[1, 2, 3, 0]);
    }
}
