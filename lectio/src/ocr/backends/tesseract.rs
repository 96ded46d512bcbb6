//! Tesseract backend via `leptess`.
//!
//! Tesseract has no DB detector, so `box_thresh` and `unclip_ratio` are
//! accepted and ignored. Words from the TSV output are grouped into lines;
//! `drop_score` filters lines and `max_text_length` truncates them.

use image::{ImageFormat, RgbImage};
use leptess::{LepTess, Variable};
use std::io::Cursor;
use std::sync::{Mutex, PoisonError};

use crate::error::{LectioError, Result};
use crate::ocr::engine::{EngineFactory, RawRegion, RecognitionEngine};
use crate::ocr::language::LanguageKey;
use crate::ocr::params::{CharacterSet, EngineConfig};

/// Printable ASCII without space; used for case-sensitive English.
const EN_SENSITIVE_WHITELIST: &str = concat!(
    "0123456789",
    "abcdefghijklmnopqrstuvwxyz",
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
    "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~"
);

const WORD_LEVEL: u32 = 5;

pub struct TesseractFactory {
    data_path: Option<String>,
}

impl TesseractFactory {
    pub fn new(data_path: Option<String>) -> Self {
        Self { data_path }
    }
}

impl EngineFactory for TesseractFactory {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn build(&self, language: LanguageKey, config: &EngineConfig) -> Result<Box<dyn RecognitionEngine>> {
        let mut lt = LepTess::new(self.data_path.as_deref(), language.tesseract_code()).map_err(|e| {
            LectioError::Recognition(format!(
                "Failed to initialize Tesseract for '{}': {e}",
                language.tesseract_code()
            ))
        })?;

        if config.char_type == CharacterSet::EnSensitive && language == LanguageKey::En {
            lt.set_variable(Variable::TesseditCharWhitelist, EN_SENSITIVE_WHITELIST)
                .map_err(|e| LectioError::Recognition(format!("Failed to set whitelist: {e}")))?;
        }

        Ok(Box::new(TesseractEngine {
            inner: Mutex::new(lt),
            drop_score: config.drop_score,
            max_text_length: config.max_text_length as usize,
        }))
    }
}

struct TesseractEngine {
    // LepTess needs `&mut self`; concurrent requests take turns.
    inner: Mutex<LepTess>,
    drop_score: f32,
    max_text_length: usize,
}

impl RecognitionEngine for TesseractEngine {
    fn detect_and_recognize(&self, image: &RgbImage) -> Result<Vec<RawRegion>> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| LectioError::Recognition(format!("Failed to encode image: {e}")))?;

        let tsv = {
            let mut lt = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            lt.set_image_from_mem(&png)
                .map_err(|e| LectioError::Recognition(format!("Failed to set image: {e}")))?;
            lt.get_tsv_text(0)
                .map_err(|e| LectioError::Recognition(format!("Failed to extract text: {e}")))?
        };

        Ok(parse_tsv_lines(&tsv)
            .into_iter()
            .filter(|line| line.score >= self.drop_score)
            .map(|mut line| {
                if line.text.chars().count() > self.max_text_length {
                    line.text = line.text.chars().take(self.max_text_length).collect();
                }
                line
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineId {
    page: u32,
    block: u32,
    paragraph: u32,
    line: u32,
}

struct LineAccumulator {
    id: LineId,
    words: Vec<String>,
    confidence_sum: f32,
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl LineAccumulator {
    fn finish(self) -> RawRegion {
        let score = self.confidence_sum / self.words.len() as f32 / 100.0;
        RawRegion::from_rect(
            self.left as f32,
            self.top as f32,
            self.right as f32,
            self.bottom as f32,
            self.words.join(" "),
            score,
        )
    }
}

/// Groups word rows of Tesseract TSV output into lines, in reading order.
fn parse_tsv_lines(tsv: &str) -> Vec<RawRegion> {
    let mut lines = Vec::new();
    let mut current: Option<LineAccumulator> = None;

    for row in tsv.lines() {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let nums: Option<Vec<u32>> = cols[..10].iter().map(|c| c.trim().parse().ok()).collect();
        let Some(nums) = nums else {
            // Header row or malformed line.
            continue;
        };
        let Ok(confidence) = cols[10].trim().parse::<f32>() else {
            continue;
        };
        let text = cols[11..].join("\t");
        let text = text.trim();
        if nums[0] != WORD_LEVEL || text.is_empty() || confidence < 0.0 {
            continue;
        }

        let id = LineId {
            page: nums[1],
            block: nums[2],
            paragraph: nums[3],
            line: nums[4],
        };
        let (left, top, width, height) = (nums[6], nums[7], nums[8], nums[9]);

        match current.as_mut() {
            Some(acc) if acc.id == id => {
                acc.words.push(text.to_string());
                acc.confidence_sum += confidence;
                acc.left = acc.left.min(left);
                acc.top = acc.top.min(top);
                acc.right = acc.right.max(left + width);
                acc.bottom = acc.bottom.max(top + height);
            }
            _ => {
                if let Some(done) = current.take() {
                    lines.push(done.finish());
                }
                current = Some(LineAccumulator {
                    id,
                    words: vec![text.to_string()],
                    confidence_sum: confidence,
                    left,
                    top,
                    right: left + width,
                    bottom: top + height,
                });
            }
        }
    }

    if let Some(done) = current {
        lines.push(done.finish());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t
4\t1\t1\t1\t1\t0\t10\t20\t200\t30\t-1\t
5\t1\t1\t1\t1\t1\t10\t20\t80\t30\t96.5\tHello
5\t1\t1\t1\t1\t2\t100\t22\t110\t28\t91.5\tworld
5\t1\t1\t1\t2\t1\t12\t60\t50\t25\t40\tsecond
5\t1\t1\t1\t2\t2\t70\t60\t10\t25\t-1\t
";

    #[test]
    fn test_words_grouped_into_lines() {
        let lines = parse_tsv_lines(SAMPLE);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Hello world");
        assert_eq!(
            lines[0].quad,
            [[10.0, 20.0], [210.0, 20.0], [210.0, 50.0], [10.0, 50.0]]
        );
        assert!((lines[0].score - 0.94).abs() < 1e-4);
        assert_eq!(lines[1].text, "second");
        assert!((lines[1].score - 0.40).abs() < 1e-4);
    }

    #[test]
    fn test_blank_page_yields_no_lines() {
        let tsv = "1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t\n";
        assert!(parse_tsv_lines(tsv).is_empty());
        assert!(parse_tsv_lines("").is_empty());
    }

    #[test]
    fn test_whitelist_is_printable_ascii() {
        assert!(EN_SENSITIVE_WHITELIST
            .chars()
            .all(|c| c.is_ascii_graphic()));
        assert_eq!(EN_SENSITIVE_WHITELIST.len(), 94);
    }
}
