pub struct DPMatrix {
    pub n_rows: usize,
    pub n_cols: usize,
    data: Vec<u32>,
}

impl DPMatrix {
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            data: vec![0; n_rows * n_cols],
            n_rows,
            n_cols,
        }
    }
    pub fn at(&self, i: usize, j: usize) -> u32 {
        self.data[i * self.n_cols + j]
    }
    pub fn set(&mut self, i: usize, j: usize, val: u32) {
        self.data[i * self.n_cols + j] = val;
    }
}

pub struct Sequence {
    pub tokens: Vec<String>,
    pub n_words: usize,
}

impl Sequence {
    pub fn new(text: &str) -> Self {
        let tokens = str_to_word_vec(text);
        let n_words = tokens.len();
        Sequence { tokens, n_words }
    }
}

pub fn str_to_word_vec(string: &str) -> Vec<String> {
    string.split_whitespace().map(|s| s.to_string()).collect()
}
