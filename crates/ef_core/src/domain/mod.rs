use serde::{Deserialize, Serialize};

/// Rasterized page, PNG encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    pub mime_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl PageImage {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            mime_type: "image/png".to_string(),
            bytes,
        }
    }
}

/// One page of the uploaded PDF. `page_number` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page_number: u32,
    pub text: String,
    pub image: PageImage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub source_page: u32,
    /// Ordinal in document order.
    pub position: u32,
    /// Character offsets into the concatenated document text.
    pub start_char: usize,
    pub end_char: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqQuestion {
    pub prompt: String,
    pub options: [String; 4],
    pub correct_index: usize,
    pub source_batch: u32,
}

impl McqQuestion {
    pub fn correct_label(&self) -> char {
        option_label(self.correct_index)
    }

    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index.min(3)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortAnswerQuestion {
    pub prompt: String,
    pub reference_answer: String,
    pub source_batch: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EssayQuestion {
    pub prompt: String,
    pub key_points: Vec<String>,
    pub source_batch: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExamQuestion {
    Mcq(McqQuestion),
    ShortAnswer(ShortAnswerQuestion),
    Essay(EssayQuestion),
}

impl ExamQuestion {
    pub fn prompt(&self) -> &str {
        match self {
            ExamQuestion::Mcq(q) => &q.prompt,
            ExamQuestion::ShortAnswer(q) => &q.prompt,
            ExamQuestion::Essay(q) => &q.prompt,
        }
    }

    pub fn source_batch(&self) -> u32 {
        match self {
            ExamQuestion::Mcq(q) => q.source_batch,
            ExamQuestion::ShortAnswer(q) => q.source_batch,
            ExamQuestion::Essay(q) => q.source_batch,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    pub mcqs: Vec<McqQuestion>,
    pub short_answers: Vec<ShortAnswerQuestion>,
    pub essays: Vec<EssayQuestion>,
}

impl Exam {
    /// Append keeping the relative order of each category.
    pub fn push(&mut self, question: ExamQuestion) {
        match question {
            ExamQuestion::Mcq(q) => self.mcqs.push(q),
            ExamQuestion::ShortAnswer(q) => self.short_answers.push(q),
            ExamQuestion::Essay(q) => self.essays.push(q),
        }
    }

    pub fn question_count(&self) -> usize {
        self.mcqs.len() + self.short_answers.len() + self.essays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.question_count() == 0
    }
}

impl FromIterator<ExamQuestion> for Exam {
    fn from_iter<I: IntoIterator<Item = ExamQuestion>>(iter: I) -> Self {
        let mut exam = Exam::default();
        for q in iter {
            exam.push(q);
        }
        exam
    }
}

pub const OPTION_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

pub fn option_label(index: usize) -> char {
    OPTION_LABELS.get(index).copied().unwrap_or('?')
}
