#![allow(dead_code)]

use logify_engine::trainer::{parse_base_corpus, Trainer};
use logify_engine::{LabeledText, SpamModel};
use tokio_util::sync::CancellationToken;

pub const BASE_CORPUS: &str = "\
ham\tHey are we still on for dinner tonight?
ham\tCan you grab lunch with me today at noon
ham\tRunning a bit late, see you at the station
ham\tLunch at 1pm works, see you there
ham\tDid you get my message about the meeting tomorrow
ham\tMum says dinner is at seven
ham\tOk thanks, talk to you later
ham\tHappy birthday! Hope you have a lovely day
ham\tI will pick up milk on the way home
ham\tAre you still coming to lunch on friday
ham\tSorry I missed your call, will ring back soon
ham\tThe meeting got moved to the afternoon
spam\tWINNER! You have won a cash prize, call now to claim
spam\tURGENT: your mobile has won a guaranteed reward, txt CLAIM to 80062
spam\tFree entry in a weekly competition to win cash, text WIN now
spam\tCongratulations! Claim your free prize voucher, reply YES
spam\tYou have been selected for a cash award, call 09061701461 now
spam\tPrivate! Your account statement shows unclaimed prize, call now
";

pub fn base_corpus() -> Vec<LabeledText> {
    parse_base_corpus(BASE_CORPUS)
}

pub fn trained_model() -> SpamModel {
    Trainer::default()
        .retrain(&base_corpus(), &[], &CancellationToken::new())
        .expect("fixture model trains")
        .model
}
