use gambit_engine::errors::RulesError;
use gambit_engine::game::Game;
use shakmaty::{Role, Square};

#[test]
fn illegal_move_is_rejected_without_touching_the_position() {
    let mut game = Game::new();
    let before = game.fen();

    let err = game.play_squares("e2", "e5").unwrap_err();
    assert_eq!(
        err,
        RulesError::IllegalMove {
            from: "e2".into(),
            to: "e5".into()
        }
    );
    assert_eq!(game.fen(), before);
    assert_eq!(game.plies(), 0);
}

#[test]
fn moving_the_wrong_colour_is_illegal() {
    let mut game = Game::new();
    assert!(game.play_squares("e7", "e5").is_err());
}

#[test]
fn unknown_square_names_are_reported() {
    let mut game = Game::new();
    let err = game.play_squares("z9", "e4").unwrap_err();
    assert!(matches!(err, RulesError::InvalidSquare(ref s) if s == "z9"));
}

#[test]
fn capture_metadata_is_reported() {
    let mut game = Game::new();
    game.play_squares("e2", "e4").unwrap();
    game.play_squares("d7", "d5").unwrap();
    let capture = game.play_squares("e4", "d5").unwrap();

    assert_eq!(capture.captured, Some(Role::Pawn));
    assert_eq!(capture.from, Square::E4);
    assert_eq!(capture.to, Square::D5);
    assert!(!capture.check);
}

#[test]
fn castling_from_king_squares() {
    let mut game =
        Game::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R b KQkq - 0 1").expect("position");
    let castle = game.play_squares("e8", "c8").expect("long castle");

    assert_eq!(castle.uci, "e8c8");
    assert!(game.fen().starts_with("2kr3r/"));
}

#[test]
fn promotion_defaults_to_queen() {
    let mut game = Game::from_fen("4k3/1P6/8/8/8/8/8/4K3 w - - 0 1").expect("position");
    let promo = game.play_squares("b7", "b8").expect("promotion");

    assert_eq!(promo.promotion, Some(Role::Queen));
    assert_eq!(promo.uci, "b7b8q");
    assert!(promo.check);
}
