//! crates/tarot_journal_core/src/catalog.rs
//!
//! The static card catalog: all 78 cards with bilingual names, keyword
//! sets, and orientation-dependent summaries. Built once at process start
//! and never mutated afterwards.

use std::collections::HashMap;

use crate::domain::{Arcana, Suit, TarotCard};

/// Placeholder illustration, seeded by card id so each card gets a stable image.
fn image_url(id: &str) -> String {
    format!("https://picsum.photos/seed/{id}/300/500")
}

#[allow(clippy::too_many_arguments)]
fn card(
    id: &str,
    name: &str,
    name_cn: &str,
    arcana: Arcana,
    suit: Option<Suit>,
    number: u8,
    upright_keywords: &[&str],
    reversed_keywords: &[&str],
    upright_summary: &str,
    reversed_summary: &str,
) -> TarotCard {
    TarotCard {
        id: id.to_string(),
        name: name.to_string(),
        name_cn: name_cn.to_string(),
        arcana,
        suit,
        number,
        upright_keywords: upright_keywords.iter().map(|k| k.to_string()).collect(),
        reversed_keywords: reversed_keywords.iter().map(|k| k.to_string()).collect(),
        upright_summary: upright_summary.to_string(),
        reversed_summary: reversed_summary.to_string(),
        image_url: image_url(id),
    }
}

fn major(
    number: u8,
    name: &str,
    name_cn: &str,
    upright_keywords: &[&str],
    reversed_keywords: &[&str],
    upright_summary: &str,
    reversed_summary: &str,
) -> TarotCard {
    card(
        &format!("maj_{number}"),
        name,
        name_cn,
        Arcana::Major,
        None,
        number,
        upright_keywords,
        reversed_keywords,
        upright_summary,
        reversed_summary,
    )
}

fn major_arcana() -> Vec<TarotCard> {
    vec![
        major(0, "The Fool", "愚者", &["開始", "冒險", "純真"], &["魯莽", "風險", "愚蠢"], "新的旅程即將開始，保持開放的心。", "當心過於衝動或未經深思熟慮的決定。"),
        major(1, "The Magician", "魔術師", &["創造力", "技能", "意志力"], &["欺騙", "無能", "猶豫"], "你擁有實現目標所需的所有資源。", "注意溝通不良或被誤導的可能性。"),
        major(2, "The High Priestess", "女祭司", &["直覺", "潛意識", "神祕"], &["壓抑", "膚淺", "混亂"], "傾聽內在的聲音，相信你的直覺。", "你可能忽略了內心的指引或被表面蒙蔽。"),
        major(3, "The Empress", "皇后", &["豐饒", "母性", "自然"], &["依賴", "窒息", "匱乏"], "享受生活中的富足與美好，創造力的展現。", "注意過度保護或情感上的勒索。"),
        major(4, "The Emperor", "皇帝", &["權威", "結構", "控制"], &["暴政", "僵化", "冷酷"], "建立秩序與規則，展現領導力。", "避免過於專斷或固執己見。"),
        major(5, "The Hierophant", "教皇", &["傳統", "信仰", "學習"], &["反叛", "束縛", "偽善"], "尋求精神指引或遵循傳統智慧。", "是時候打破陳規，尋找自己的真理。"),
        major(6, "The Lovers", "戀人", &["愛", "和諧", "選擇"], &["不和", "失衡", "分離"], "重要的關係或決定，這關乎價值觀的選擇。", "面臨情感上的矛盾或錯誤的選擇。"),
        major(7, "The Chariot", "戰車", &["勝利", "意志", "決心"], &["失控", "失敗", "攻擊"], "透過自律與意志力克服障礙。", "情緒可能失控，或方向迷失。"),
        major(8, "Strength", "力量", &["勇氣", "耐心", "同情"], &["軟弱", "自卑", "恐懼"], "以柔克剛，內在的力量比外在更強大。", "這時候需要克服內心的恐懼與自我懷疑。"),
        major(9, "The Hermit", "隱士", &["內省", "孤獨", "引導"], &["孤立", "迷失", "拒絕"], "這是一段需要獨處與反思的時間。", "過度封閉自己，拒絕他人的幫助。"),
        major(10, "Wheel of Fortune", "命運之輪", &["改變", "週期", "命運"], &["厄運", "抗拒", "中斷"], "順應時勢，改變是不可避免的。", "面對突如其來的變化，感到無力掌控。"),
        major(11, "Justice", "正義", &["公平", "真理", "因果"], &["不公", "偏見", "逃避"], "誠實面對自己，承擔行為的後果。", "可能遭受不公平的對待，或在逃避責任。"),
        major(12, "The Hanged Man", "吊人", &["犧牲", "等待", "新視角"], &["停滯", "無謂犧牲", "拖延"], "換個角度看世界，有時候暫停是為了更好的前進。", "無謂的犧牲或陷入僵局，無法動彈。"),
        major(13, "Death", "死神", &["結束", "轉變", "重生"], &["抗拒改變", "停滯", "腐敗"], "舊的不去新的不來，這是一個深刻轉變的時刻。", "恐懼結束，死守著不再服務於你的事物。"),
        major(14, "Temperance", "節制", &["平衡", "適度", "耐心"], &["失衡", "極端", "匆忙"], "尋找中庸之道，保持身心靈的平衡。", "生活失去平衡，過度縱容或缺乏耐心。"),
        major(15, "The Devil", "惡魔", &["束縛", "物質", "誘惑"], &["釋放", "覺醒", "脫離"], "面對內心的慾望與陰影，不要被物質束縛。", "意識到束縛的存在，並嘗試從中解脫。"),
        major(16, "The Tower", "高塔", &["災難", "劇變", "啟示"], &["恐懼", "勉強維持", "混亂"], "雖然痛苦，但崩壞是為了重建更堅固的基礎。", "抗拒不可避免的改變，只會帶來更多痛苦。"),
        major(17, "The Star", "星星", &["希望", "靈感", "平靜"], &["絕望", "失望", "悲觀"], "充滿希望的未來，保持信心。", "感到氣餒，失去了對未來的憧憬。"),
        major(18, "The Moon", "月亮", &["幻覺", "恐懼", "潛意識"], &["清晰", "釋放", "困惑"], "事情並非表象所見，面對內心的不安。", "迷霧逐漸散去，真相將會大白。"),
        major(19, "The Sun", "太陽", &["快樂", "成功", "活力"], &["憂鬱", "短暫", "虛榮"], "如同陽光普照般的喜悅與成功。", "雖然有快樂，但可能被烏雲暫時遮蔽。"),
        major(20, "Judgement", "審判", &["重生", "召喚", "覺醒"], &["懷疑", "拒絕", "後悔"], "回應內心的召喚，做出重要的決定。", "忽視良知的聲音，或對過去感到後悔。"),
        major(21, "The World", "世界", &["完成", "整合", "旅行"], &["未完成", "遲滯", "空虛"], "一個階段的完美結束，享受成果。", "感覺缺少了什麼，無法畫下完美的句點。"),
    ]
}

/// The 14 ranks of each suit: (rank number, English name, Chinese name, theme).
const RANKS: [(u8, &str, &str, &str); 14] = [
    (1, "Ace", "王牌", "新的開始"),
    (2, "Two", "二", "選擇與平衡"),
    (3, "Three", "三", "合作與成長"),
    (4, "Four", "四", "穩定與固守"),
    (5, "Five", "五", "衝突與失落"),
    (6, "Six", "六", "和諧與回憶"),
    (7, "Seven", "七", "策略與評估"),
    (8, "Eight", "八", "專注與細節"),
    (9, "Nine", "九", "獨處與完成"),
    (10, "Ten", "十", "圓滿與傳承"),
    (11, "Page", "侍者", "學習與消息"),
    (12, "Knight", "騎士", "行動與追求"),
    (13, "Queen", "皇后", "滋養與理解"),
    (14, "King", "國王", "掌控與權威"),
];

fn suit_keywords(suit: Suit) -> [&'static str; 3] {
    match suit {
        Suit::Wands => ["行動", "熱情", "靈感"],
        Suit::Cups => ["情感", "關係", "直覺"],
        Suit::Swords => ["思想", "衝突", "真相"],
        Suit::Pentacles => ["物質", "工作", "財富"],
    }
}

fn minor_arcana() -> Vec<TarotCard> {
    let mut cards = Vec::with_capacity(56);
    for suit in Suit::ALL {
        let base = suit_keywords(suit);
        for (number, rank_name, rank_cn, theme) in RANKS {
            let id = format!("{}_{}", suit.id_fragment(), number);
            let upright: Vec<&str> = base.iter().copied().chain([theme, "正向"]).collect();
            let reversed: Vec<&str> = base.iter().copied().chain(["阻礙", "反向"]).collect();
            cards.push(card(
                &id,
                &format!("{} of {}", rank_name, suit.name()),
                &format!("{}{}", suit.name_cn(), rank_cn),
                Arcana::Minor,
                Some(suit),
                number,
                &upright,
                &reversed,
                &format!("{}領域中關於{}的課題。", suit.name_cn(), theme),
                &format!("{}能量的阻滯或過度，{}受到挑戰。", suit.name_cn(), theme),
            ));
        }
    }
    cards
}

/// The full deck, with an index for lookups by card id.
#[derive(Debug)]
pub struct Catalog {
    cards: Vec<TarotCard>,
    by_id: HashMap<String, usize>,
}

impl Catalog {
    /// Builds the standard 78-card deck: 22 Major arcana followed by the
    /// four 14-card suits.
    pub fn standard() -> Self {
        let mut cards = major_arcana();
        cards.extend(minor_arcana());
        let by_id = cards
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        Self { cards, by_id }
    }

    /// All cards, in deck order.
    pub fn cards(&self) -> &[TarotCard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Looks up a card by its stable identifier.
    pub fn get(&self, id: &str) -> Option<&TarotCard> {
        self.by_id.get(id).map(|&i| &self.cards[i])
    }

    /// Looks up a card, substituting the first catalog entry for an unknown
    /// identifier. Returns whether a substitution happened; callers replaying
    /// history should log a reconstruction warning when it did.
    pub fn resolve(&self, id: &str) -> (&TarotCard, bool) {
        match self.get(id) {
            Some(card) => (card, false),
            None => (&self.cards[0], true),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn deck_has_78_unique_ids() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.len(), 78);
        let ids: HashSet<&str> = catalog.cards().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), 78);
    }

    #[test]
    fn major_arcana_have_no_suit() {
        let catalog = Catalog::standard();
        for card in catalog.cards().iter().filter(|c| c.arcana == Arcana::Major) {
            assert!(card.suit.is_none(), "{} carries a suit", card.id);
        }
        assert_eq!(
            catalog.cards().iter().filter(|c| c.arcana == Arcana::Major).count(),
            22
        );
    }

    #[test]
    fn each_suit_has_fourteen_ranks() {
        let catalog = Catalog::standard();
        for suit in Suit::ALL {
            let ranks: HashSet<u8> = catalog
                .cards()
                .iter()
                .filter(|c| c.suit == Some(suit))
                .map(|c| c.number)
                .collect();
            assert_eq!(ranks.len(), 14, "suit {:?}", suit);
            assert!(ranks.iter().all(|r| (1..=14).contains(r)));
        }
    }

    #[test]
    fn id_scheme_is_stable() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.get("maj_0").unwrap().name, "The Fool");
        assert_eq!(catalog.get("wands_1").unwrap().name, "Ace of Wands");
        assert_eq!(catalog.get("pentacles_14").unwrap().name_cn, "錢幣國王");
        assert!(catalog.get("cups_15").is_none());
    }

    #[test]
    fn resolve_falls_back_to_first_entry() {
        let catalog = Catalog::standard();
        let (card, substituted) = catalog.resolve("maj_7");
        assert_eq!(card.id, "maj_7");
        assert!(!substituted);

        let (card, substituted) = catalog.resolve("no_such_card");
        assert_eq!(card.id, catalog.cards()[0].id);
        assert!(substituted);
    }
}
