#![no_main]
use libfuzzer_sys::fuzz_target;
use sipha_atn::atn::LexerAction;
use sipha_atn::recognizer::SilentErrorListener;
use sipha_atn::stream::CodePointStream;
use sipha_atn::testing::{Element, LexerGrammar};
use sipha_atn::{Lexer, SharedCache};
use std::sync::{Arc, OnceLock};

fn cache() -> Arc<SharedCache> {
    static CACHE: OnceLock<Arc<SharedCache>> = OnceLock::new();
    Arc::clone(CACHE.get_or_init(|| {
        let atn = LexerGrammar::new()
            .rule("IF", 1, vec![vec![Element::text("if")]])
            .rule("ID", 2, vec![vec![Element::plus(vec![vec![Element::range('a', 'z')]])]])
            .rule("INT", 3, vec![vec![Element::plus(vec![vec![Element::range('0', '9')]])]])
            .rule(
                "OPEN",
                4,
                vec![vec![Element::text("\""), Element::action(LexerAction::PushMode(1))]],
            )
            .rule(
                "COMMENT",
                5,
                vec![vec![
                    Element::text("/*"),
                    Element::lazy_star(vec![vec![Element::wildcard()]]),
                    Element::text("*/"),
                    Element::skip(),
                ]],
            )
            .rule("WS", 6, vec![vec![Element::plus(vec![vec![Element::set(&[' ', '\n'])]]), Element::skip()]])
            .mode()
            .rule("TEXT", 7, vec![vec![Element::plus(vec![vec![Element::not_set(&['"'])]])]])
            .rule("CLOSE", 8, vec![vec![Element::text("\""), Element::action(LexerAction::PopMode)]])
            .build()
            .expect("fuzz lexer builds");
        Arc::new(SharedCache::new(Arc::new(atn)))
    }))
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut lexer = Lexer::new(cache(), CodePointStream::new(text));
    lexer.set_error_listener(Box::new(SilentErrorListener));
    if let Ok(tokens) = lexer.all_tokens() {
        assert!(tokens.last().is_some_and(|t| t.is_eof()));
        assert!(tokens.windows(2).all(|w| w[0].end <= w[1].start));
    }
});
