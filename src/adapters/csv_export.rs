//! CSV output for catalog views.

use std::io::Write;

use crate::domain::catalog::MarketListing;
use crate::domain::error::MarketError;
use crate::domain::player::Player;
use crate::domain::team::Squad;

fn csv_err(e: csv::Error) -> MarketError {
    MarketError::Io(std::io::Error::other(e))
}

fn player_record(player: &Player) -> [String; 5] {
    [
        player.id.to_string(),
        player.name.clone(),
        player.position.code().to_string(),
        player.price.to_string(),
        player
            .asking_price()
            .map(|p| p.to_string())
            .unwrap_or_default(),
    ]
}

pub fn write_players<W: Write>(writer: W, players: &[Player]) -> Result<(), MarketError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["id", "name", "position", "price", "asking_price"])
        .map_err(csv_err)?;
    for player in players {
        wtr.write_record(player_record(player)).map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_squad<W: Write>(writer: W, squad: &Squad) -> Result<(), MarketError> {
    write_players(writer, &squad.players)
}

pub fn write_listings<W: Write>(writer: W, listings: &[MarketListing]) -> Result<(), MarketError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "id",
        "name",
        "position",
        "price",
        "asking_price",
        "team_id",
        "team_name",
    ])
    .map_err(csv_err)?;
    for listing in listings {
        let [id, name, position, price, asking] = player_record(&listing.player);
        wtr.write_record([
            id,
            name,
            position,
            price,
            asking,
            listing.team_id.to_string(),
            listing.team_name.clone(),
        ])
        .map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::player::{Listing, Ownership, PlayerId, Position};
    use crate::domain::team::TeamId;

    fn player(id: i64, name: &str, listing: Listing) -> Player {
        Player {
            id: PlayerId(id),
            name: name.into(),
            position: Position::Midfielder,
            price: 1_500_000,
            owner: Ownership::Team(TeamId(9)),
            listing,
        }
    }

    #[test]
    fn players_have_header_and_blank_asking_price() {
        let mut out = Vec::new();
        write_players(&mut out, &[player(1, "Marco Rossi", Listing::Unlisted)]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "id,name,position,price,asking_price\n1,Marco Rossi,MID,1500000,\n"
        );
    }

    #[test]
    fn listings_quote_team_names_with_commas() {
        let listing = MarketListing {
            player: player(
                2,
                "Kai Chen",
                Listing::Listed {
                    asking_price: 2_000_000,
                },
            ),
            team_id: TeamId(9),
            team_name: "Rovers, United".into(),
        };
        let mut out = Vec::new();
        write_listings(&mut out, &[listing]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("id,name,position,price,asking_price,team_id,team_name")
        );
        assert_eq!(
            lines.next(),
            Some("2,Kai Chen,MID,1500000,2000000,9,\"Rovers, United\"")
        );
    }
}
