use crate::types::{ChatSearchHit, ChatSearchIndexStatus};
use serde_json::json;
use std::io::{self, Write};

/// 搜索结果回调（chat.1.chatUi）
pub trait ChatUi {
    fn search_hit(&mut self, hit: &ChatSearchHit) -> io::Result<()>;

    fn search_done(&mut self, num_hits: usize) -> io::Result<()>;

    fn search_index_status(&mut self, status: &ChatSearchIndexStatus) -> io::Result<()>;
}

/// 每个回调输出一行 JSON
pub struct JsonLinesUi<W: Write> {
    out: W,
}

impl JsonLinesUi<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> JsonLinesUi<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, value: serde_json::Value) -> io::Result<()> {
        writeln!(self.out, "{}", value)?;
        self.out.flush()
    }
}

impl<W: Write> ChatUi for JsonLinesUi<W> {
    fn search_hit(&mut self, hit: &ChatSearchHit) -> io::Result<()> {
        self.emit(json!({ "event": "hit", "hit": hit }))
    }

    fn search_done(&mut self, num_hits: usize) -> io::Result<()> {
        self.emit(json!({ "event": "done", "numHits": num_hits }))
    }

    fn search_index_status(&mut self, status: &ChatSearchIndexStatus) -> io::Result<()> {
        self.emit(json!({ "event": "index_status", "percentIndexed": status.percent_indexed }))
    }
}
