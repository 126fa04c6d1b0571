//! Sport detection from free text
//!
//! An ordered regex table over league tokens and team nicknames. Order is
//! load-bearing: NHL runs before NBA so "Blackhawks" is not swallowed by
//! the NBA "hawks" pattern, and the pro leagues run before the college
//! catch-alls.

use crate::domain::Sport;
use regex::Regex;
use std::sync::OnceLock;

fn detection_table() -> &'static Vec<(Sport, Regex)> {
    static TABLE: OnceLock<Vec<(Sport, Regex)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let patterns: &[(Sport, &str)] = &[
            (
                Sport::Nhl,
                r"(?i)\b(nhl|stanley cup|maple leafs|canadiens|bruins|rangers|flyers|penguins|capitals|blackhawks|red wings|avalanche|oilers|flames|canucks|kraken|golden knights|lightning|sabres|senators|devils|islanders|blue jackets|predators|wild|blues|sharks|ducks|coyotes|hurricanes|utah hockey)\b",
            ),
            (
                Sport::Nba,
                r"(?i)\b(nba|lakers|celtics|warriors|knicks|heat|bucks|suns|76ers|sixers|nets|bulls|mavericks|mavs|nuggets|clippers|grizzlies|timberwolves|wolves|pelicans|thunder|spurs|rockets|hawks|hornets|pistons|pacers|magic|wizards|raptors|cavaliers|cavs|kings|trail blazers|blazers|jazz)\b",
            ),
            (
                Sport::Nfl,
                r"(?i)\b(nfl|super bowl|chiefs|eagles|bills|cowboys|49ers|niners|dolphins|ravens|bengals|lions|packers|vikings|saints|chargers|raiders|broncos|seahawks|commanders|bears|giants|jets|patriots|steelers|browns|colts|texans|titans|jaguars|panthers|falcons|buccaneers|cardinals|rams)\b",
            ),
            (
                Sport::Mlb,
                r"(?i)\b(mlb|world series|yankees|red sox|dodgers|mets|cubs|braves|astros|phillies|padres|blue jays|orioles|guardians|white sox|twins|royals|tigers|angels|athletics|mariners|rays|marlins|nationals|pirates|reds|rockies|brewers|diamondbacks)\b",
            ),
            (
                Sport::Ncaab,
                r"(?i)\b(ncaab|ncaa basketball|march madness|college basketball|final four)\b",
            ),
            (
                Sport::Ncaaf,
                r"(?i)\b(ncaaf|ncaa football|college football|heisman)\b",
            ),
            (
                Sport::Epl,
                r"(?i)\b(premier league|epl|manchester united|man united|man utd|manchester city|man city|arsenal|chelsea|liverpool|tottenham|everton|newcastle|aston villa|west ham|brighton|fulham|brentford|crystal palace|bournemouth|nottingham forest|leicester|southampton|wolverhampton)\b",
            ),
            (
                Sport::ChampionsLeague,
                r"(?i)\b(champions league|ucl|real madrid|barcelona|bayern|paris saint germain|psg|juventus|inter milan|ac milan|atletico|dortmund|porto|benfica|ajax)\b",
            ),
            (
                Sport::Mls,
                r"(?i)\b(mls|inter miami|la galaxy|lafc|atlanta united|seattle sounders|portland timbers|austin fc|st louis city)\b",
            ),
        ];

        patterns
            .iter()
            .map(|(sport, pattern)| (*sport, Regex::new(pattern).expect("static sport pattern")))
            .collect()
    })
}

/// Detect the canonical sport from free text (event title plus question).
/// First match in table order wins.
pub fn detect_sport(text: &str) -> Option<Sport> {
    detection_table()
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(sport, _)| *sport)
}
