//! Shared fixtures for unit tests: temp paths, in-memory PDFs and a scripted
//! document model.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::backend::{DocumentModel, RgbaFrame};
use crate::error::{AppError, AppResult};
use crate::geometry::{PageRect, SizeF};

pub(crate) fn unique_temp_path(suffix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();

    let mut path = std::env::temp_dir();
    path.push(format!("pagescroll_{suffix}_{}_{}", process::id(), nanos));
    path
}

pub(crate) fn build_pdf(page_texts: &[&str]) -> Vec<u8> {
    let page_texts = if page_texts.is_empty() {
        vec!["".to_string()]
    } else {
        page_texts
            .iter()
            .map(|text| {
                let escaped = escape_literal_string(text);
                format!("BT /F1 14 Tf 36 260 Td ({escaped}) Tj ET")
            })
            .collect()
    };

    build_pdf_from_streams(&page_texts)
}

fn build_pdf_from_streams(page_streams: &[String]) -> Vec<u8> {
    let page_count = page_streams.len();
    let page_ids: Vec<usize> = (0..page_count).map(|i| 4 + i * 2).collect();

    let mut objects = Vec::new();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());

    let kids = page_ids
        .iter()
        .map(|id| format!("{id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");
    objects.push(format!(
        "<< /Type /Pages /Kids [{kids}] /Count {page_count} >>"
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

    for (index, stream) in page_streams.iter().enumerate() {
        let content_id = 5 + index * 2;

        let page_obj = format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 300 300] /Resources << /Font << /F1 3 0 R >> >> /Contents {content_id} 0 R >>"
        );
        let content_obj = format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        );

        objects.push(page_obj);
        objects.push(content_obj);
    }

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::new();
    offsets.push(0_usize);
    for (index, object) in objects.iter().enumerate() {
        let object_id = index + 1;
        offsets.push(bytes.len());
        bytes.extend_from_slice(format!("{object_id} 0 obj\n{object}\nendobj\n").as_bytes());
    }

    let xref_start = bytes.len();
    bytes.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    bytes.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets.iter().skip(1) {
        bytes.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }

    bytes.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );

    bytes
}

fn escape_literal_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }

    out
}

/// A latch that holds document calls until opened.
#[derive(Debug, Default)]
pub(crate) struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    pub(crate) fn closed() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn open(&self) {
        let mut open = self.open.lock().expect("gate lock");
        *open = true;
        self.changed.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock().expect("gate lock");
        while !*open {
            open = self.changed.wait(open).expect("gate lock");
        }
    }
}

/// Records what the document model was asked to do.
#[derive(Debug, Default)]
pub(crate) struct CallLog {
    pub(crate) rasterized: Mutex<Vec<usize>>,
    pub(crate) searched: Mutex<Vec<usize>>,
    active: AtomicUsize,
    pub(crate) peak_active: AtomicUsize,
}

impl CallLog {
    pub(crate) fn rasterized_pages(&self) -> Vec<usize> {
        self.rasterized.lock().expect("log lock").clone()
    }

    pub(crate) fn searched_pages(&self) -> Vec<usize> {
        self.searched.lock().expect("log lock").clone()
    }
}

/// In-memory document with fixed page sizes and scripted search hits.
pub(crate) struct FakeDocument {
    path: PathBuf,
    sizes: Vec<SizeF>,
    hits: HashMap<usize, Vec<PageRect>>,
    failures: HashMap<usize, AtomicUsize>,
    panic_page: Option<usize>,
    gate: Option<Arc<Gate>>,
    log: Arc<CallLog>,
}

impl FakeDocument {
    pub(crate) fn uniform(page_count: usize, size: SizeF) -> Self {
        Self {
            path: PathBuf::from(format!("fake-{page_count}.pdf")),
            sizes: vec![size; page_count],
            hits: HashMap::new(),
            failures: HashMap::new(),
            panic_page: None,
            gate: None,
            log: Arc::new(CallLog::default()),
        }
    }

    pub(crate) fn with_sizes(sizes: Vec<SizeF>) -> Self {
        let mut doc = Self::uniform(0, SizeF::default());
        doc.path = PathBuf::from(format!("fake-{}.pdf", sizes.len()));
        doc.sizes = sizes;
        doc
    }

    pub(crate) fn with_hits(mut self, page: usize, rects: Vec<PageRect>) -> Self {
        self.hits.insert(page, rects);
        self
    }

    /// Makes the first `times` rasterizations of `page` fail.
    pub(crate) fn with_failures(mut self, page: usize, times: usize) -> Self {
        self.failures.insert(page, AtomicUsize::new(times));
        self
    }

    /// Makes every rasterization and search of `page` panic.
    pub(crate) fn with_panic(mut self, page: usize) -> Self {
        self.panic_page = Some(page);
        self
    }

    pub(crate) fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn log(&self) -> Arc<CallLog> {
        Arc::clone(&self.log)
    }

    fn check_page(&self, page: usize) -> AppResult<()> {
        if page >= self.sizes.len() {
            return Err(AppError::invalid_argument("page index is out of range"));
        }
        Ok(())
    }

    fn maybe_panic(&self, page: usize) {
        if self.panic_page == Some(page) {
            panic!("scripted panic on page {page}");
        }
    }

    fn take_failure(&self, page: usize) -> bool {
        self.failures.get(&page).is_some_and(|remaining| {
            remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
        })
    }
}

impl DocumentModel for FakeDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    fn page_size(&self, page: usize) -> AppResult<SizeF> {
        self.check_page(page)?;
        Ok(self.sizes[page])
    }

    fn rasterize(&self, page: usize, dpi_x: f32, dpi_y: f32) -> AppResult<RgbaFrame> {
        self.check_page(page)?;
        self.maybe_panic(page);
        let active = self.log.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.peak_active.fetch_max(active, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        self.log.rasterized.lock().expect("log lock").push(page);
        self.log.active.fetch_sub(1, Ordering::SeqCst);
        if self.take_failure(page) {
            return Err(AppError::rasterize(page, "scripted failure"));
        }

        let size = self.sizes[page];
        let width = (size.width * dpi_x / 72.0).ceil().max(1.0) as u32;
        let height = (size.height * dpi_y / 72.0).ceil().max(1.0) as u32;
        Ok(RgbaFrame {
            width,
            height,
            pixels: vec![0xff; width as usize * height as usize * 4].into(),
        })
    }

    fn search(
        &self,
        page: usize,
        _query: &str,
        _case_insensitive: bool,
    ) -> AppResult<Vec<PageRect>> {
        self.check_page(page)?;
        self.maybe_panic(page);
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        self.log.searched.lock().expect("log lock").push(page);
        Ok(self.hits.get(&page).cloned().unwrap_or_default())
    }
}
