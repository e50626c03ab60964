pub mod vila_bot {
    include!("vila_bot.rs");
}
