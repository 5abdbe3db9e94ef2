//! The PGN game-tree input type, plus a minimal reader that turns PGN
//! text into one.
//!
//! The PGN tokeniser and the chess rules engine are external
//! collaborators: the ingestion engine's entry point takes an
//! already-built [`GameTree`], never PGN text. The reader in this module
//! exists only so the `import` CLI command has something to call; it is
//! a tag-pair/movetext parser that also covers nested variations, NAGs,
//! and semicolon comments.

use std::str::{Chars, FromStr};

use chess::{Board, ChessMove, MoveGen, Piece, Square};

use crate::error::StoreError;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Comment {
    pub text: String,
    pub is_pre: bool,
    pub is_semicolon: bool,
    pub comment_newline: bool,
}

/// One mainline ply: the move itself, plus everything attached to it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MoveSlot {
    pub mv: ChessMove,
    pub comments: Vec<Comment>,
    pub nags: Vec<u8>,
    /// Alternatives to this move, each an independent tree forking from
    /// the position *before* `mv` was played.
    pub variations: Vec<GameTree>,
    /// A bare newline annotation at this ply (distinct from a comment).
    pub newline: bool,
    /// The board position before this move was played. Only used while
    /// parsing, to give a later `(...)` variation its fork-point board.
    pub(crate) fork_board: Option<Board>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum GameResultTag {
    WhiteWins,
    BlackWins,
    Draw,
    Unknown,
}

impl Default for GameResultTag {
    fn default() -> Self {
        GameResultTag::Unknown
    }
}

impl GameResultTag {
    pub fn from_str_tag(s: &str) -> Self {
        match s.trim() {
            "1-0" => GameResultTag::WhiteWins,
            "0-1" => GameResultTag::BlackWins,
            "1/2-1/2" => GameResultTag::Draw,
            _ => GameResultTag::Unknown,
        }
    }

    pub fn to_blob_code(self) -> u16 {
        match self {
            GameResultTag::WhiteWins => 0,
            GameResultTag::BlackWins => 1,
            GameResultTag::Draw => 2,
            GameResultTag::Unknown => 3,
        }
    }
}

/// A game tree: a mainline of moves, each optionally carrying comments,
/// NAGs, and nested variations. Headers are only meaningful on the
/// top-level tree; variations ingest with empty tag maps per the design.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct GameTree {
    pub str_tags: Vec<(String, String)>,
    pub extra_tags: Vec<(String, String)>,
    pub moves: Vec<MoveSlot>,
    pub result: GameResultTag,
    pub starting_board: Option<Board>,
    /// Comments that precede the first move. Only ever non-empty when
    /// `moves` is empty: once a move is parsed, any pending pre-move
    /// comments are attached to that move's slot instead (see
    /// `parse_movetext`).
    pub leading_comments: Vec<Comment>,
}

impl GameTree {
    pub fn starting_board(&self) -> Board {
        self.starting_board.unwrap_or_default()
    }
}

/// Converts a NAG suffix glyph ("!", "?", "!!", "??", "!?", "?!") into
/// its numeric code.
fn suffix_to_nag(suffix: &str) -> Option<u8> {
    Some(match suffix {
        "!" => 1,
        "?" => 2,
        "!!" => 3,
        "??" => 4,
        "!?" => 5,
        "?!" => 6,
        _ => return None,
    })
}

/// Resolves standard algebraic notation (including castling, captures,
/// disambiguation, and promotion) to the one legal move it denotes on
/// `board`. This is the only place the reader touches chess semantics;
/// everything else is pure text handling.
pub fn resolve_san(board: &Board, text: &str) -> Result<ChessMove, StoreError> {
    let mut san = text.trim_end_matches(['+', '#']);
    // strip a NAG suffix glyph if present so callers can extract it separately
    for suffix in ["!!", "??", "!?", "?!", "!", "?"] {
        if san.ends_with(suffix) && san.len() > suffix.len() {
            san = &san[..san.len() - suffix.len()];
        }
    }
    if matches!(san, "O-O" | "0-0") {
        return castling_move(board, false);
    }
    if matches!(san, "O-O-O" | "0-0-0") {
        return castling_move(board, true);
    }

    let (body, promotion) = match san.split_once('=') {
        Some((b, p)) => (b, Some(parse_piece_letter(p).ok_or_else(|| StoreError::MalformedPgn(format!("bad promotion in {text:?}")))?)),
        None => (san, None),
    };
    let piece = match body.chars().next() {
        Some(c) if c.is_ascii_uppercase() => parse_piece_letter(&c.to_string()).ok_or_else(|| StoreError::MalformedPgn(format!("bad piece in {text:?}")))?,
        _ => Piece::Pawn,
    };
    let rest = if piece == Piece::Pawn { body } else { &body[1..] };
    let rest = rest.replace('x', "");
    if rest.len() < 2 {
        return Err(StoreError::MalformedPgn(format!("unparsable move {text:?}")));
    }
    let dest_str = &rest[rest.len() - 2..];
    let disambiguation = &rest[..rest.len() - 2];
    let dest = Square::from_str(dest_str).map_err(|_| StoreError::MalformedPgn(format!("bad destination square in {text:?}")))?;
    let disamb_file = disambiguation.chars().find(|c| c.is_ascii_lowercase());
    let disamb_rank = disambiguation.chars().find(|c| c.is_ascii_digit());

    let mut candidates = MoveGen::new_legal(board).filter(|m| {
        m.get_dest() == dest
            && m.get_promotion() == promotion
            && board.piece_on(m.get_source()) == Some(piece)
            && disamb_file.map_or(true, |f| square_file_char(m.get_source()) == f)
            && disamb_rank.map_or(true, |r| square_rank_char(m.get_source()) == r)
    });
    let mv = candidates.next().ok_or_else(|| StoreError::MalformedPgn(format!("no legal move matches {text:?}")))?;
    if candidates.next().is_some() {
        return Err(StoreError::MalformedPgn(format!("ambiguous move {text:?}")));
    }
    Ok(mv)
}

fn square_file_char(sq: Square) -> char {
    (b'a' + (sq.to_index() as u8 % 8)) as char
}

fn square_rank_char(sq: Square) -> char {
    (b'1' + (sq.to_index() as u8 / 8)) as char
}

fn parse_piece_letter(s: &str) -> Option<Piece> {
    Some(match s {
        "K" => Piece::King,
        "Q" => Piece::Queen,
        "R" => Piece::Rook,
        "B" => Piece::Bishop,
        "N" => Piece::Knight,
        _ => return None,
    })
}

fn castling_move(board: &Board, queenside: bool) -> Result<ChessMove, StoreError> {
    MoveGen::new_legal(board)
        .find(|m| {
            board.piece_on(m.get_source()) == Some(Piece::King)
                && {
                    let from_file = m.get_source().to_index() % 8;
                    let to_file = m.get_dest().to_index() % 8;
                    let delta = to_file as i32 - from_file as i32;
                    if queenside { delta <= -2 } else { delta >= 2 }
                }
        })
        .ok_or_else(|| StoreError::MalformedPgn("illegal castling move".to_string()))
}

struct Reader<'a> {
    chars: std::iter::Peekable<Chars<'a>>,
    first_in_line: bool,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Self {
        Self { chars: input.chars().peekable(), first_in_line: true }
    }

    fn eat(&mut self) -> Option<char> {
        let next = self.chars.next();
        self.first_in_line = next == Some('\n');
        next
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if self.first_in_line && c == '%' {
                while self.peek().is_some() && !self.first_in_line {
                    self.eat();
                }
                continue;
            }
            if c.is_whitespace() {
                self.eat();
            } else {
                break;
            }
        }
    }

    fn parse_tag_pairs(&mut self) -> Result<Vec<(String, String)>, StoreError> {
        let mut tags = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() != Some('[') {
                break;
            }
            self.eat();
            let mut name = String::new();
            while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
                name.push(self.eat().unwrap());
            }
            self.skip_ws();
            if self.peek() != Some('"') {
                return Err(StoreError::MalformedPgn("expected quoted tag value".to_string()));
            }
            self.eat();
            let mut value = String::new();
            loop {
                match self.eat() {
                    Some('\\') => {
                        if let Some(c) = self.eat() {
                            value.push(c);
                        }
                    }
                    Some('"') => break,
                    Some(c) => value.push(c),
                    None => return Err(StoreError::MalformedPgn("unterminated tag value".to_string())),
                }
            }
            self.skip_ws();
            if self.peek() != Some(']') {
                return Err(StoreError::MalformedPgn("expected ']' after tag value".to_string()));
            }
            self.eat();
            tags.push((name, value));
        }
        Ok(tags)
    }

    fn parse_comment(&mut self) -> Result<Comment, StoreError> {
        let is_semicolon = self.peek() == Some(';');
        self.eat();
        let mut text = String::new();
        if is_semicolon {
            while self.peek().is_some_and(|c| c != '\n') {
                text.push(self.eat().unwrap());
            }
        } else {
            loop {
                match self.eat() {
                    Some('}') => break,
                    Some(c) => text.push(c),
                    None => return Err(StoreError::MalformedPgn("unterminated comment".to_string())),
                }
            }
        }
        Ok(Comment { text: text.trim().to_string(), is_pre: false, is_semicolon, comment_newline: false })
    }

    fn next_token(&mut self) -> Option<String> {
        self.skip_ws();
        let mut tok = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '{' || c == '(' || c == ')' || c == ';' {
                break;
            }
            tok.push(self.eat().unwrap());
        }
        if tok.is_empty() {
            None
        } else {
            Some(tok)
        }
    }

    /// Parses a movetext sequence (mainline or a variation body) starting
    /// from `board`, stopping at `)` or end of input. `is_variation_start`
    /// suppresses re-reading sibling variations at the very first move,
    /// per the design's note that a variation's own first move only
    /// contributes its own forks, not a re-walk of its parent's.
    fn parse_movetext(&mut self, mut board: Board, depth: usize) -> Result<(Vec<MoveSlot>, GameResultTag, Vec<Comment>), StoreError> {
        if depth > 256 {
            return Err(StoreError::VariationTooDeep(256));
        }
        let mut moves = Vec::new();
        let mut result = GameResultTag::Unknown;
        let mut pending_pre: Vec<Comment> = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None | Some(')') => break,
                Some('{') => {
                    let mut c = self.parse_comment()?;
                    if moves.is_empty() {
                        c.is_pre = true;
                        pending_pre.push(c);
                    } else {
                        moves.last_mut().unwrap().comments.push(c);
                    }
                    continue;
                }
                Some(';') => {
                    let mut c = self.parse_comment()?;
                    if moves.is_empty() {
                        c.is_pre = true;
                        pending_pre.push(c);
                    } else {
                        moves.last_mut().unwrap().comments.push(c);
                    }
                    continue;
                }
                Some('$') => {
                    self.eat();
                    let mut digits = String::new();
                    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        digits.push(self.eat().unwrap());
                    }
                    if let (Some(last), Ok(code)) = (moves.last_mut(), digits.parse::<u8>()) {
                        last.nags.push(code);
                    }
                    continue;
                }
                Some('(') => {
                    self.eat();
                    let Some(last) = moves.last_mut() else {
                        return Err(StoreError::MalformedPgn("variation with no preceding move".to_string()));
                    };
                    let fork_board = last.fork_board.expect("fork board recorded when the move was pushed");
                    let variation = self.parse_variation(fork_board, depth + 1)?;
                    last.variations.push(variation);
                    self.skip_ws();
                    if self.peek() == Some(')') {
                        self.eat();
                    }
                    continue;
                }
                _ => {}
            }
            let Some(tok) = self.next_token() else { break };
            if let Some(r) = parse_result_token(&tok) {
                result = r;
                break;
            }
            if is_move_number_token(&tok) {
                continue;
            }
            let mut nags = Vec::new();
            let mut core = tok.as_str();
            for suffix in ["!!", "??", "!?", "?!", "!", "?"] {
                if core.ends_with(suffix) && core.len() > suffix.len() {
                    nags.push(suffix_to_nag(suffix).unwrap());
                    core = &core[..core.len() - suffix.len()];
                    break;
                }
            }
            let mv = resolve_san(&board, core)?;
            let fork_board = board;
            board = board.make_move_new(mv);
            let mut slot = MoveSlot {
                mv,
                comments: Vec::new(),
                nags,
                variations: Vec::new(),
                newline: false,
                fork_board: Some(fork_board),
            };
            for c in pending_pre.drain(..) {
                slot.comments.push(c);
            }
            moves.push(slot);
        }
        Ok((moves, result, pending_pre))
    }

    fn parse_variation(&mut self, start: Board, depth: usize) -> Result<GameTree, StoreError> {
        let (moves, result, leading_comments) = self.parse_movetext(start, depth)?;
        Ok(GameTree { str_tags: Vec::new(), extra_tags: Vec::new(), moves, result, starting_board: Some(start), leading_comments })
    }

    fn parse_game(&mut self) -> Result<GameTree, StoreError> {
        let tags = self.parse_tag_pairs()?;
        let mut str_tags = Vec::new();
        let mut extra_tags = Vec::new();
        for (name, value) in tags {
            if crate::metadata::STR_TAGS.contains(&name.as_str()) {
                str_tags.push((name, value));
            } else {
                extra_tags.push((name, value));
            }
        }
        let board = Board::default();
        let (moves, result, leading_comments) = self.parse_movetext(board, 0)?;
        Ok(GameTree { str_tags, extra_tags, moves, result, starting_board: Some(board), leading_comments })
    }
}

fn is_move_number_token(tok: &str) -> bool {
    let trimmed = tok.trim_end_matches('.');
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit())
}

fn parse_result_token(tok: &str) -> Option<GameResultTag> {
    match tok {
        "1-0" => Some(GameResultTag::WhiteWins),
        "0-1" => Some(GameResultTag::BlackWins),
        "1/2-1/2" => Some(GameResultTag::Draw),
        "*" => Some(GameResultTag::Unknown),
        _ => None,
    }
}

pub fn parse_pgn(input: &str) -> Result<GameTree, StoreError> {
    let mut reader = Reader::new(input);
    reader.parse_game()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_game() {
        let pgn = "[Event \"Test\"]\n[Result \"1-0\"]\n\n1. e4 e5 2. Nf3 Nc6 1-0";
        let tree = parse_pgn(pgn).unwrap();
        assert_eq!(tree.moves.len(), 4);
        assert_eq!(tree.result, GameResultTag::WhiteWins);
        assert_eq!(tree.str_tags, vec![("Event".to_string(), "Test".to_string()), ("Result".to_string(), "1-0".to_string())]);
    }

    #[test]
    fn parses_comment_and_nag() {
        let pgn = "1. e4 e5 {good} 2. Nf3!? Nc6 *";
        let tree = parse_pgn(pgn).unwrap();
        assert_eq!(tree.moves[1].comments.len(), 1);
        assert_eq!(tree.moves[1].comments[0].text, "good");
        assert_eq!(tree.moves[2].nags, vec![5]);
    }

    #[test]
    fn parses_castling() {
        let pgn = "1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 4. O-O Nf6 *";
        let tree = parse_pgn(pgn).unwrap();
        assert_eq!(tree.moves.len(), 7);
    }

    #[test]
    fn parses_nested_variation() {
        let pgn = "1. e4 e5 (1... c5 2. Nf3) 2. Nf3 *";
        let tree = parse_pgn(pgn).unwrap();
        assert_eq!(tree.moves[1].variations.len(), 1);
        assert_eq!(tree.moves[1].variations[0].moves.len(), 2);
    }

    #[test]
    fn zero_move_game_keeps_leading_comment() {
        let tree = parse_pgn("{opening remark} *").unwrap();
        assert!(tree.moves.is_empty());
        assert_eq!(tree.leading_comments.len(), 1);
        assert_eq!(tree.leading_comments[0].text, "opening remark");
    }

    #[test]
    fn empty_variation_keeps_leading_comment() {
        let pgn = "1. e4 e5 (1... {huh}) 2. Nf3 *";
        let tree = parse_pgn(pgn).unwrap();
        let variation = &tree.moves[1].variations[0];
        assert!(variation.moves.is_empty());
        assert_eq!(variation.leading_comments.len(), 1);
        assert_eq!(variation.leading_comments[0].text, "huh");
    }

    #[test]
    fn nonempty_movetext_has_no_leading_comments_left_over() {
        let tree = parse_pgn("{pre} 1. e4 e5 *").unwrap();
        assert!(tree.leading_comments.is_empty());
        assert_eq!(tree.moves[0].comments.len(), 1);
        assert_eq!(tree.moves[0].comments[0].text, "pre");
    }
}
