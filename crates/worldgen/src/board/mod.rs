mod convert;
mod format;
mod manifest;
mod store;

pub use convert::{convert_board_to_grid, presentation_from_board};
pub use format::{BoardError, BoardFile, RawTile};
pub use manifest::load_manifest;
pub use store::{
    BoardKind, BoardSource, BoardStore, FsBoardSource, MemoryBoardSource, PreloadSummary,
};
