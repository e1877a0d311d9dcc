/// One competition the site publishes standings for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct League {
    pub ordinal: u32,
    pub name: &'static str,
    pub season_id: &'static str,
    pub path: &'static str,
}

pub const LEAGUES: &[League] = &[
    League {
        ordinal: 1,
        name: "英超",
        season_id: "2024-2025",
        path: "/data/1",
    },
    League {
        ordinal: 2,
        name: "西甲",
        season_id: "2024-2025",
        path: "/data/2",
    },
    League {
        ordinal: 3,
        name: "意甲",
        season_id: "2024-2025",
        path: "/data/3",
    },
    League {
        ordinal: 4,
        name: "德甲",
        season_id: "2024-2025",
        path: "/data/4",
    },
    League {
        ordinal: 5,
        name: "法甲",
        season_id: "2024-2025",
        path: "/data/5",
    },
    League {
        ordinal: 231,
        name: "中超",
        season_id: "2025",
        path: "/data/231",
    },
];

pub fn lookup(ordinal: u32) -> Option<&'static League> {
    LEAGUES.iter().find(|l| l.ordinal == ordinal)
}

pub fn lookup_by_name(name: &str) -> Option<&'static League> {
    let name = name.trim();
    LEAGUES.iter().find(|l| l.name == name)
}

pub fn league_url(base_url: &str, league: &League) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), league.path)
}

pub fn team_url(base_url: &str, team_id: &str) -> String {
    format!("{}/team/{team_id}.html", base_url.trim_end_matches('/'))
}
