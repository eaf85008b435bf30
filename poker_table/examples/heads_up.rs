//! Heads-Up Table Example
//!
//! Runs a table with two calling stations and prints each hand result.

use poker_table::{
    Table, TableConfig, TableError,
    entities::ActionRequest,
};

const HANDS: u64 = 3;

#[tokio::main]
async fn main() -> Result<(), TableError> {
    println!("=== Heads-Up Table Example ===\n");

    let table = Table::new(TableConfig {
        name: "Example".to_string(),
        showdown_delay_ms: 100,
        ..TableConfig::default()
    })?;
    table.start().await?;
    table.player_joins(1, "alice", 1000).await?;
    table.player_joins(2, "bob", 1000).await?;

    let mut states = table.subscribe();
    let mut printed = 0;
    loop {
        let state = states.borrow_and_update().clone();

        if let Some(result) = &state.last_hand
            && result.hand_number > printed
        {
            printed = result.hand_number;
            let board: Vec<String> = result.board.iter().map(ToString::to_string).collect();
            println!("Hand #{}: board [{}]", result.hand_number, board.join(" "));
            for hand in &result.revealed {
                println!("  seat {} shows {:?}", hand.seat, hand.value.rank);
            }
            for pot in &result.pots {
                for payout in &pot.winners {
                    println!("  user {} wins ${}", payout.user_id, payout.amount);
                }
            }
            if printed >= HANDS {
                break;
            }
        }

        // Call anything, check otherwise.
        if state.phase.is_betting()
            && let Some(seat) = state.to_act.and_then(|idx| state.seats.get(idx))
            && let Some(user_id) = seat.user_id
        {
            let request = if seat.street_bet < state.current_bet {
                ActionRequest::call(user_id)
            } else {
                ActionRequest::check(user_id)
            };
            table.submit_action(request).await?;
        }

        if states.changed().await.is_err() {
            break;
        }
    }

    table.stop().await;
    println!("\n=== End of Heads-Up Table Example ===");
    Ok(())
}
