use super::{IntStream, TokenSource, TokenStream};
use crate::error::LexerError;
use crate::interval::EOF;
use crate::lexer::{Token, DEFAULT_CHANNEL};

/// Token stream backed by a pre-tokenized `Vec`, showing only the tokens of
/// one channel
///
/// Off-channel tokens stay in the buffer (reachable through
/// [`TokenStream::get`]) but lookahead and `consume` skip over them. The
/// buffer always ends with an EOF token.
#[derive(Debug, Clone)]
pub struct CommonTokenStream {
    tokens: Vec<Token>,
    p: usize,
    channel: i32,
}

impl CommonTokenStream {
    /// Stream over `tokens` on `channel`; token indexes are renumbered
    #[must_use]
    pub fn new(mut tokens: Vec<Token>, channel: i32) -> Self {
        if tokens.last().map_or(true, |t| t.token_type != EOF) {
            let position = tokens.last().map_or(0, |t| t.end);
            tokens.push(Token::eof(position, 0, 0));
        }
        for (index, token) in tokens.iter_mut().enumerate() {
            token.token_index = Some(index);
        }
        let mut stream = Self {
            tokens,
            p: 0,
            channel,
        };
        stream.p = stream.next_on_channel(0);
        stream
    }

    /// Drain `source` and stream its default-channel tokens
    pub fn from_source(source: &mut impl TokenSource) -> Result<Self, LexerError> {
        Ok(Self::new(source.tokenize()?, DEFAULT_CHANNEL))
    }

    /// Every buffered token, any channel
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    fn is_visible(&self, token: &Token) -> bool {
        token.channel == self.channel || token.token_type == EOF
    }

    /// First visible index at or after `i`
    fn next_on_channel(&self, mut i: usize) -> usize {
        let last = self.tokens.len() - 1;
        while i < last && !self.is_visible(&self.tokens[i]) {
            i += 1;
        }
        i.min(last)
    }

    /// Last visible index strictly before `i`
    fn previous_on_channel(&self, i: usize) -> Option<usize> {
        (0..i.min(self.tokens.len()))
            .rev()
            .find(|&j| self.is_visible(&self.tokens[j]))
    }
}

impl IntStream for CommonTokenStream {
    fn consume(&mut self) {
        if self.tokens[self.p].token_type == EOF {
            tracing::trace!(index = self.p, "consume at EOF ignored");
            return;
        }
        self.p = self.next_on_channel(self.p + 1);
    }

    fn la(&mut self, i: isize) -> i32 {
        self.lt(i).map_or(EOF, |t| t.token_type)
    }

    fn index(&self) -> usize {
        self.p
    }

    fn seek(&mut self, index: usize) {
        self.p = self.next_on_channel(index);
    }

    fn size(&self) -> usize {
        self.tokens.len()
    }
}

impl TokenStream for CommonTokenStream {
    fn lt(&mut self, k: isize) -> Option<&Token> {
        match k {
            0 => None,
            k if k < 0 => {
                let mut i = self.p;
                for _ in 0..k.unsigned_abs() {
                    i = self.previous_on_channel(i)?;
                }
                self.tokens.get(i)
            }
            k => {
                let mut i = self.p;
                for _ in 1..k.unsigned_abs() {
                    i = self.next_on_channel(i + 1);
                }
                self.tokens.get(i)
            }
        }
    }

    fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    fn text(&self, start: usize, stop: usize) -> String {
        self.tokens
            .iter()
            .skip(start)
            .take((stop + 1).saturating_sub(start))
            .take_while(|t| t.token_type != EOF)
            .map(|t| t.text.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::HIDDEN_CHANNEL;

    fn token(token_type: i32, channel: i32, text: &str) -> Token {
        let mut t = Token::eof(0, 1, 0);
        t.token_type = token_type;
        t.channel = channel;
        t.text = text.into();
        t
    }

    #[test]
    fn test_lookahead_skips_hidden_tokens() {
        let mut stream = CommonTokenStream::new(
            vec![
                token(1, DEFAULT_CHANNEL, "a"),
                token(9, HIDDEN_CHANNEL, " "),
                token(2, DEFAULT_CHANNEL, "b"),
            ],
            DEFAULT_CHANNEL,
        );
        assert_eq!(stream.la(1), 1);
        assert_eq!(stream.la(2), 2);
        assert_eq!(stream.la(3), EOF);
        stream.consume();
        assert_eq!(stream.index(), 2);
        assert_eq!(stream.la(-1), 1);
        assert_eq!(stream.get(1).map(|t| t.channel), Some(HIDDEN_CHANNEL));
        assert_eq!(stream.text(0, 2), "a b");
    }

    #[test]
    fn test_consume_stops_at_eof() {
        let mut stream = CommonTokenStream::new(Vec::new(), DEFAULT_CHANNEL);
        assert_eq!(stream.la(1), EOF);
        stream.consume();
        assert_eq!(stream.index(), 0);
        assert_eq!(stream.size(), 1);
    }
}
