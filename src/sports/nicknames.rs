//! Canonical team nickname tables
//!
//! Per sport, maps abbreviations, nicknames, and city shorthands to full
//! team names. Matcher tier 2 expands both halves of an exchange title
//! through these before re-running the direct matcher.

use crate::domain::{normalize, Sport};

type Entry = (&'static str, &'static str);

const NBA: &[Entry] = &[
    ("hawks", "Atlanta Hawks"),
    ("celtics", "Boston Celtics"),
    ("nets", "Brooklyn Nets"),
    ("hornets", "Charlotte Hornets"),
    ("bulls", "Chicago Bulls"),
    ("cavaliers", "Cleveland Cavaliers"),
    ("cavs", "Cleveland Cavaliers"),
    ("mavericks", "Dallas Mavericks"),
    ("mavs", "Dallas Mavericks"),
    ("nuggets", "Denver Nuggets"),
    ("pistons", "Detroit Pistons"),
    ("warriors", "Golden State Warriors"),
    ("rockets", "Houston Rockets"),
    ("pacers", "Indiana Pacers"),
    ("clippers", "Los Angeles Clippers"),
    ("lakers", "Los Angeles Lakers"),
    ("grizzlies", "Memphis Grizzlies"),
    ("heat", "Miami Heat"),
    ("bucks", "Milwaukee Bucks"),
    ("timberwolves", "Minnesota Timberwolves"),
    ("wolves", "Minnesota Timberwolves"),
    ("pelicans", "New Orleans Pelicans"),
    ("knicks", "New York Knicks"),
    ("thunder", "Oklahoma City Thunder"),
    ("okc", "Oklahoma City Thunder"),
    ("magic", "Orlando Magic"),
    ("76ers", "Philadelphia 76ers"),
    ("sixers", "Philadelphia 76ers"),
    ("suns", "Phoenix Suns"),
    ("trail blazers", "Portland Trail Blazers"),
    ("blazers", "Portland Trail Blazers"),
    ("kings", "Sacramento Kings"),
    ("spurs", "San Antonio Spurs"),
    ("raptors", "Toronto Raptors"),
    ("jazz", "Utah Jazz"),
    ("wizards", "Washington Wizards"),
];

const NFL: &[Entry] = &[
    ("cardinals", "Arizona Cardinals"),
    ("falcons", "Atlanta Falcons"),
    ("ravens", "Baltimore Ravens"),
    ("bills", "Buffalo Bills"),
    ("panthers", "Carolina Panthers"),
    ("bears", "Chicago Bears"),
    ("bengals", "Cincinnati Bengals"),
    ("browns", "Cleveland Browns"),
    ("cowboys", "Dallas Cowboys"),
    ("broncos", "Denver Broncos"),
    ("lions", "Detroit Lions"),
    ("packers", "Green Bay Packers"),
    ("texans", "Houston Texans"),
    ("colts", "Indianapolis Colts"),
    ("jaguars", "Jacksonville Jaguars"),
    ("chiefs", "Kansas City Chiefs"),
    ("raiders", "Las Vegas Raiders"),
    ("chargers", "Los Angeles Chargers"),
    ("rams", "Los Angeles Rams"),
    ("dolphins", "Miami Dolphins"),
    ("vikings", "Minnesota Vikings"),
    ("patriots", "New England Patriots"),
    ("saints", "New Orleans Saints"),
    ("giants", "New York Giants"),
    ("jets", "New York Jets"),
    ("eagles", "Philadelphia Eagles"),
    ("steelers", "Pittsburgh Steelers"),
    ("49ers", "San Francisco 49ers"),
    ("niners", "San Francisco 49ers"),
    ("seahawks", "Seattle Seahawks"),
    ("buccaneers", "Tampa Bay Buccaneers"),
    ("bucs", "Tampa Bay Buccaneers"),
    ("titans", "Tennessee Titans"),
    ("commanders", "Washington Commanders"),
];

const NHL: &[Entry] = &[
    ("ducks", "Anaheim Ducks"),
    ("bruins", "Boston Bruins"),
    ("sabres", "Buffalo Sabres"),
    ("flames", "Calgary Flames"),
    ("hurricanes", "Carolina Hurricanes"),
    ("canes", "Carolina Hurricanes"),
    ("blackhawks", "Chicago Blackhawks"),
    ("avalanche", "Colorado Avalanche"),
    ("avs", "Colorado Avalanche"),
    ("blue jackets", "Columbus Blue Jackets"),
    ("stars", "Dallas Stars"),
    ("red wings", "Detroit Red Wings"),
    ("oilers", "Edmonton Oilers"),
    ("panthers", "Florida Panthers"),
    ("kings", "Los Angeles Kings"),
    ("wild", "Minnesota Wild"),
    ("canadiens", "Montreal Canadiens"),
    ("habs", "Montreal Canadiens"),
    ("predators", "Nashville Predators"),
    ("preds", "Nashville Predators"),
    ("devils", "New Jersey Devils"),
    ("islanders", "New York Islanders"),
    ("rangers", "New York Rangers"),
    ("senators", "Ottawa Senators"),
    ("sens", "Ottawa Senators"),
    ("flyers", "Philadelphia Flyers"),
    ("penguins", "Pittsburgh Penguins"),
    ("pens", "Pittsburgh Penguins"),
    ("sharks", "San Jose Sharks"),
    ("kraken", "Seattle Kraken"),
    ("blues", "St Louis Blues"),
    ("lightning", "Tampa Bay Lightning"),
    ("bolts", "Tampa Bay Lightning"),
    ("maple leafs", "Toronto Maple Leafs"),
    ("leafs", "Toronto Maple Leafs"),
    ("canucks", "Vancouver Canucks"),
    ("golden knights", "Vegas Golden Knights"),
    ("knights", "Vegas Golden Knights"),
    ("capitals", "Washington Capitals"),
    ("caps", "Washington Capitals"),
    ("jets", "Winnipeg Jets"),
];

const MLB: &[Entry] = &[
    ("diamondbacks", "Arizona Diamondbacks"),
    ("dbacks", "Arizona Diamondbacks"),
    ("braves", "Atlanta Braves"),
    ("orioles", "Baltimore Orioles"),
    ("red sox", "Boston Red Sox"),
    ("cubs", "Chicago Cubs"),
    ("white sox", "Chicago White Sox"),
    ("reds", "Cincinnati Reds"),
    ("guardians", "Cleveland Guardians"),
    ("rockies", "Colorado Rockies"),
    ("tigers", "Detroit Tigers"),
    ("astros", "Houston Astros"),
    ("royals", "Kansas City Royals"),
    ("angels", "Los Angeles Angels"),
    ("dodgers", "Los Angeles Dodgers"),
    ("marlins", "Miami Marlins"),
    ("brewers", "Milwaukee Brewers"),
    ("twins", "Minnesota Twins"),
    ("mets", "New York Mets"),
    ("yankees", "New York Yankees"),
    ("athletics", "Oakland Athletics"),
    ("phillies", "Philadelphia Phillies"),
    ("pirates", "Pittsburgh Pirates"),
    ("padres", "San Diego Padres"),
    ("giants", "San Francisco Giants"),
    ("mariners", "Seattle Mariners"),
    ("cardinals", "St Louis Cardinals"),
    ("rays", "Tampa Bay Rays"),
    ("rangers", "Texas Rangers"),
    ("blue jays", "Toronto Blue Jays"),
    ("nationals", "Washington Nationals"),
];

const EPL: &[Entry] = &[
    ("arsenal", "Arsenal"),
    ("aston villa", "Aston Villa"),
    ("villa", "Aston Villa"),
    ("bournemouth", "Bournemouth"),
    ("brentford", "Brentford"),
    ("brighton", "Brighton and Hove Albion"),
    ("chelsea", "Chelsea"),
    ("crystal palace", "Crystal Palace"),
    ("palace", "Crystal Palace"),
    ("everton", "Everton"),
    ("fulham", "Fulham"),
    ("liverpool", "Liverpool"),
    ("man city", "Manchester City"),
    ("manchester city", "Manchester City"),
    ("man united", "Manchester United"),
    ("man utd", "Manchester United"),
    ("manchester united", "Manchester United"),
    ("newcastle", "Newcastle United"),
    ("nottingham forest", "Nottingham Forest"),
    ("forest", "Nottingham Forest"),
    ("tottenham", "Tottenham Hotspur"),
    ("west ham", "West Ham United"),
    ("wolverhampton", "Wolverhampton Wanderers"),
];

const UCL: &[Entry] = &[
    ("real madrid", "Real Madrid"),
    ("barcelona", "Barcelona"),
    ("barca", "Barcelona"),
    ("bayern", "Bayern Munich"),
    ("psg", "Paris Saint Germain"),
    ("paris saint germain", "Paris Saint Germain"),
    ("juventus", "Juventus"),
    ("juve", "Juventus"),
    ("inter milan", "Inter Milan"),
    ("inter", "Inter Milan"),
    ("ac milan", "AC Milan"),
    ("milan", "AC Milan"),
    ("atletico", "Atletico Madrid"),
    ("dortmund", "Borussia Dortmund"),
    ("porto", "FC Porto"),
    ("benfica", "Benfica"),
    ("ajax", "Ajax"),
];

const MLS: &[Entry] = &[
    ("inter miami", "Inter Miami"),
    ("la galaxy", "LA Galaxy"),
    ("galaxy", "LA Galaxy"),
    ("lafc", "Los Angeles FC"),
    ("atlanta united", "Atlanta United"),
    ("sounders", "Seattle Sounders"),
    ("timbers", "Portland Timbers"),
    ("austin", "Austin FC"),
    ("st louis city", "St Louis City"),
];

fn table_for(sport: Sport) -> &'static [Entry] {
    match sport {
        Sport::Nba | Sport::Ncaab => NBA,
        Sport::Nfl | Sport::Ncaaf => NFL,
        Sport::Nhl => NHL,
        Sport::Mlb => MLB,
        Sport::Epl => EPL,
        Sport::ChampionsLeague => UCL,
        Sport::Mls => MLS,
        Sport::Unknown => &[],
    }
}

/// Expand an abbreviation, nickname, or city shorthand into the full team
/// name for a sport. Exact normalized key match wins; containment in
/// either direction is the fallback.
pub fn expand_nickname(sport: Sport, raw: &str) -> Option<&'static str> {
    let needle = normalize(raw);
    if needle.is_empty() {
        return None;
    }

    let table = table_for(sport);

    if let Some((_, full)) = table.iter().find(|(key, _)| *key == needle) {
        return Some(full);
    }

    table
        .iter()
        .find(|(key, full)| {
            needle.contains(key) || normalize(full).contains(&needle)
        })
        .map(|(_, full)| *full)
}

/// Common club affixes that carry no identity
const AFFIXES: &[&str] = &["fc", "sc", "afc", "cf", "bc", "the"];

/// Drop affix tokens from a normalized name
pub fn strip_affixes(name: &str) -> String {
    normalize(name)
        .split_whitespace()
        .filter(|token| !AFFIXES.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The identity-bearing last word of a team name ("nickname"), when it is
/// long enough to be meaningful on its own
pub fn team_nickname(full_name: &str) -> Option<String> {
    strip_affixes(full_name)
        .split_whitespace()
        .last()
        .filter(|w| w.len() > 2)
        .map(|w| w.to_string())
}
