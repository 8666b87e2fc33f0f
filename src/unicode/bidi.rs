//! Unicode Bidirectional Algorithm (UAX #9): embedding-level resolution
//! and visual run reordering (§4.E.3, §4.E.6).

use crate::buffer::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidiClass {
    L,
    R,
    AL,
    EN,
    ES,
    ET,
    AN,
    CS,
    NSM,
    BN,
    B,
    S,
    WS,
    ON,
    LRE,
    LRO,
    RLE,
    RLO,
    PDF,
    LRI,
    RLI,
    FSI,
    PDI,
}

impl BidiClass {
    pub fn of(cp: u32) -> Self {
        match cp {
            0x0000..=0x0008 | 0x000E..=0x001B => BidiClass::BN,
            0x0009 | 0x000B | 0x001F => BidiClass::S,
            0x000A | 0x000D | 0x001C..=0x001E | 0x0085 | 0x2029 => BidiClass::B,
            0x000C | 0x0020 => BidiClass::WS,
            0x0041..=0x005A | 0x0061..=0x007A => BidiClass::L,
            0x0030..=0x0039 => BidiClass::EN,
            0x002B | 0x002D => BidiClass::ES,
            0x0023..=0x0025 => BidiClass::ET,
            0x002C | 0x002E | 0x002F | 0x003A => BidiClass::CS,
            0x00C0..=0x024F => BidiClass::L,
            0x0590..=0x05FF => BidiClass::R,
            0x0600..=0x0605 | 0x0608 | 0x060B | 0x060D | 0x061B..=0x064A
            | 0x066D..=0x066F | 0x0671..=0x06D5 | 0x06E5..=0x06E6
            | 0x06EE..=0x06EF | 0x06FA..=0x06FF => BidiClass::AL,
            0x0660..=0x0669 | 0x066B..=0x066C => BidiClass::AN,
            0x0606..=0x0607 | 0x0609..=0x060A | 0x060C | 0x060E..=0x061A
            | 0x064B..=0x066C => BidiClass::AL,
            0x0750..=0x077F | 0x08A0..=0x08FF => BidiClass::AL,
            0x0700..=0x074F => BidiClass::AL,
            0x0780..=0x07BF => BidiClass::AL,
            0x07C0..=0x07FF => BidiClass::R,
            0x0900..=0x0DFF => BidiClass::L,
            0x0E00..=0x0EFF => BidiClass::L,
            0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x20000..=0x2A6DF => BidiClass::L,
            0xAC00..=0xD7AF => BidiClass::L,
            0x3040..=0x30FF => BidiClass::L,
            0x2000..=0x200A => BidiClass::WS,
            0x200B => BidiClass::BN,
            0x200C..=0x200D => BidiClass::BN,
            0x200E => BidiClass::L,
            0x200F => BidiClass::R,
            0x2010..=0x2027 => BidiClass::ON,
            0x2028 => BidiClass::WS,
            0x202A => BidiClass::LRE,
            0x202B => BidiClass::RLE,
            0x202C => BidiClass::PDF,
            0x202D => BidiClass::LRO,
            0x202E => BidiClass::RLO,
            0x202F => BidiClass::CS,
            0x2030..=0x205E => BidiClass::ON,
            0x2060..=0x206F => BidiClass::BN,
            0x2066 => BidiClass::LRI,
            0x2067 => BidiClass::RLI,
            0x2068 => BidiClass::FSI,
            0x2069 => BidiClass::PDI,
            _ => BidiClass::L,
        }
    }

    pub fn is_strong(self) -> bool {
        matches!(self, BidiClass::L | BidiClass::R | BidiClass::AL)
    }

    pub fn is_explicit(self) -> bool {
        matches!(
            self,
            BidiClass::LRE
                | BidiClass::RLE
                | BidiClass::LRO
                | BidiClass::RLO
                | BidiClass::PDF
                | BidiClass::LRI
                | BidiClass::RLI
                | BidiClass::FSI
                | BidiClass::PDI
        )
    }
}

/// Embedding level, `0..=125`; even is LTR, odd is RTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level(pub u8);

impl Level {
    pub const MAX: u8 = 125;
    pub const LTR: Level = Level(0);
    pub const RTL: Level = Level(1);

    pub fn new(level: u8) -> Option<Self> {
        (level <= Self::MAX).then_some(Level(level))
    }

    pub fn is_ltr(self) -> bool {
        self.0 % 2 == 0
    }

    pub fn is_rtl(self) -> bool {
        self.0 % 2 == 1
    }

    fn next_ltr(self) -> Option<Self> {
        Self::new((self.0 + 2) & !1)
    }

    fn next_rtl(self) -> Option<Self> {
        Self::new((self.0 + 1) | 1)
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::LTR
    }
}

#[derive(Debug, Clone)]
pub struct BidiRun {
    pub start: usize,
    pub end: usize,
    pub level: Level,
}

#[derive(Debug)]
pub struct BidiParagraph {
    pub base_level: Level,
    pub levels: Vec<Level>,
}

impl BidiParagraph {
    /// Resolves embedding levels for `codepoints` given an explicit base
    /// direction, or auto-detects per P2/P3 (first strong L/R/AL) when
    /// `base_direction` is `None`.
    pub fn new(codepoints: &[u32], base_direction: Option<Direction>) -> Self {
        let classes: Vec<BidiClass> = codepoints.iter().map(|&c| BidiClass::of(c)).collect();
        let base_level = base_direction
            .map(|d| if d == Direction::RightToLeft { Level::RTL } else { Level::LTR })
            .unwrap_or_else(|| Self::determine_base_level(&classes));
        let levels = Self::resolve_levels(&classes, base_level);
        Self { base_level, levels }
    }

    fn determine_base_level(classes: &[BidiClass]) -> Level {
        let mut isolate_count = 0;
        for &class in classes {
            match class {
                BidiClass::LRI | BidiClass::RLI | BidiClass::FSI => isolate_count += 1,
                BidiClass::PDI => isolate_count = isolate_count.saturating_sub(1),
                BidiClass::L if isolate_count == 0 => return Level::LTR,
                BidiClass::R | BidiClass::AL if isolate_count == 0 => return Level::RTL,
                _ => {}
            }
        }
        Level::LTR
    }

    fn resolve_levels(classes: &[BidiClass], base_level: Level) -> Vec<Level> {
        let len = classes.len();
        if len == 0 {
            return Vec::new();
        }

        let mut levels = vec![base_level; len];
        let mut resolved = classes.to_vec();

        Self::process_explicit(&mut levels, &mut resolved, base_level);
        Self::resolve_weak(&mut resolved, &levels);
        Self::resolve_neutral(&mut resolved, &levels, base_level);
        Self::resolve_implicit(&mut levels, &resolved);
        Self::reset_whitespace(&mut levels, classes, base_level);

        levels
    }

    fn process_explicit(levels: &mut [Level], classes: &mut [BidiClass], base_level: Level) {
        let mut stack: Vec<(Level, bool, bool)> = Vec::with_capacity(63);
        let mut overflow_isolate_count = 0u32;
        let mut overflow_embedding_count = 0u32;
        let mut valid_isolate_count = 0u32;

        let mut current_level = base_level;
        let mut current_override = false;

        for i in 0..classes.len() {
            match classes[i] {
                class @ (BidiClass::RLE | BidiClass::LRE | BidiClass::RLO | BidiClass::LRO) => {
                    let is_rtl = matches!(class, BidiClass::RLE | BidiClass::RLO);
                    let is_override = matches!(class, BidiClass::RLO | BidiClass::LRO);
                    let new_level = if is_rtl { current_level.next_rtl() } else { current_level.next_ltr() };

                    if let Some(level) = new_level {
                        if overflow_isolate_count == 0 && overflow_embedding_count == 0 {
                            stack.push((current_level, current_override, false));
                            current_level = level;
                            current_override = is_override;
                        } else {
                            overflow_embedding_count += 1;
                        }
                    } else {
                        overflow_embedding_count += 1;
                    }

                    levels[i] = current_level;
                    classes[i] = BidiClass::BN;
                }

                class @ (BidiClass::RLI | BidiClass::LRI | BidiClass::FSI) => {
                    levels[i] = current_level;

                    let is_rtl = match class {
                        BidiClass::RLI => true,
                        BidiClass::LRI => false,
                        BidiClass::FSI => {
                            let mut isolate = 0;
                            let mut found_rtl = false;
                            for &c in &classes[i + 1..] {
                                match c {
                                    BidiClass::LRI | BidiClass::RLI | BidiClass::FSI => isolate += 1,
                                    BidiClass::PDI if isolate > 0 => isolate -= 1,
                                    BidiClass::PDI => break,
                                    BidiClass::L if isolate == 0 => break,
                                    BidiClass::R | BidiClass::AL if isolate == 0 => {
                                        found_rtl = true;
                                        break;
                                    }
                                    _ => {}
                                }
                            }
                            found_rtl
                        }
                        _ => unreachable!(),
                    };

                    let new_level = if is_rtl { current_level.next_rtl() } else { current_level.next_ltr() };
                    if let Some(level) = new_level {
                        if overflow_isolate_count == 0 && overflow_embedding_count == 0 {
                            valid_isolate_count += 1;
                            stack.push((current_level, current_override, true));
                            current_level = level;
                            current_override = false;
                        } else {
                            overflow_isolate_count += 1;
                        }
                    } else {
                        overflow_isolate_count += 1;
                    }
                }

                BidiClass::PDI => {
                    if overflow_isolate_count > 0 {
                        overflow_isolate_count -= 1;
                    } else if valid_isolate_count > 0 {
                        overflow_embedding_count = 0;
                        while let Some((level, over, isolate)) = stack.pop() {
                            if isolate {
                                current_level = level;
                                current_override = over;
                                valid_isolate_count -= 1;
                                break;
                            }
                        }
                    }
                    levels[i] = current_level;
                }

                BidiClass::PDF => {
                    if overflow_isolate_count == 0 {
                        if overflow_embedding_count > 0 {
                            overflow_embedding_count -= 1;
                        } else if let Some((level, over, isolate)) = stack.last() {
                            if !isolate {
                                current_level = *level;
                                current_override = *over;
                                stack.pop();
                            }
                        }
                    }
                    levels[i] = current_level;
                    classes[i] = BidiClass::BN;
                }

                BidiClass::B => levels[i] = base_level,
                BidiClass::BN => levels[i] = current_level,

                _ => {
                    levels[i] = current_level;
                    if current_override {
                        classes[i] = if current_level.is_rtl() { BidiClass::R } else { BidiClass::L };
                    }
                }
            }
        }
    }

    fn resolve_weak(classes: &mut [BidiClass], levels: &[Level]) {
        let mut i = 0;
        while i < classes.len() {
            let level = levels[i];
            let start = i;
            while i < classes.len() && levels[i] == level {
                i += 1;
            }
            Self::resolve_weak_run(&mut classes[start..i]);
        }
    }

    fn resolve_weak_run(classes: &mut [BidiClass]) {
        if classes.is_empty() {
            return;
        }

        let mut prev_type = BidiClass::ON;
        for class in classes.iter_mut() {
            if *class == BidiClass::NSM {
                *class = prev_type;
            }
            prev_type = if *class == BidiClass::PDI { BidiClass::ON } else { *class };
        }

        let mut last_strong = BidiClass::ON;
        for class in classes.iter_mut() {
            match *class {
                BidiClass::L | BidiClass::R => last_strong = *class,
                BidiClass::AL => last_strong = BidiClass::AL,
                BidiClass::EN if last_strong == BidiClass::AL => *class = BidiClass::AN,
                _ => {}
            }
        }

        for class in classes.iter_mut() {
            if *class == BidiClass::AL {
                *class = BidiClass::R;
            }
        }

        for i in 1..classes.len().saturating_sub(1) {
            let (prev, curr, next) = (classes[i - 1], classes[i], classes[i + 1]);
            if curr == BidiClass::ES && prev == BidiClass::EN && next == BidiClass::EN {
                classes[i] = BidiClass::EN;
            } else if curr == BidiClass::CS
                && ((prev == BidiClass::EN && next == BidiClass::EN)
                    || (prev == BidiClass::AN && next == BidiClass::AN))
            {
                classes[i] = prev;
            }
        }

        let mut i = 0;
        while i < classes.len() {
            if classes[i] == BidiClass::ET {
                let start = i;
                while i < classes.len() && classes[i] == BidiClass::ET {
                    i += 1;
                }
                let has_en = (start > 0 && classes[start - 1] == BidiClass::EN)
                    || (i < classes.len() && classes[i] == BidiClass::EN);
                if has_en {
                    for c in &mut classes[start..i] {
                        *c = BidiClass::EN;
                    }
                }
            } else {
                i += 1;
            }
        }

        for class in classes.iter_mut() {
            if matches!(*class, BidiClass::ES | BidiClass::ET | BidiClass::CS) {
                *class = BidiClass::ON;
            }
        }

        last_strong = BidiClass::ON;
        for class in classes.iter_mut() {
            match *class {
                BidiClass::L | BidiClass::R => last_strong = *class,
                BidiClass::EN if last_strong == BidiClass::L => *class = BidiClass::L,
                _ => {}
            }
        }
    }

    fn resolve_neutral(classes: &mut [BidiClass], levels: &[Level], base_level: Level) {
        for i in 0..classes.len() {
            if matches!(classes[i], BidiClass::ON | BidiClass::WS | BidiClass::B | BidiClass::S) {
                let before = Self::find_strong_before(classes, levels, i, base_level);
                let after = Self::find_strong_after(classes, levels, i, base_level);
                classes[i] = if before == after {
                    before
                } else if levels[i].is_rtl() {
                    BidiClass::R
                } else {
                    BidiClass::L
                };
            }
        }
    }

    fn find_strong_before(classes: &[BidiClass], levels: &[Level], pos: usize, base_level: Level) -> BidiClass {
        let level = levels[pos];
        for i in (0..pos).rev() {
            if levels[i] != level {
                break;
            }
            match classes[i] {
                BidiClass::L => return BidiClass::L,
                BidiClass::R | BidiClass::AN | BidiClass::EN => return BidiClass::R,
                _ => {}
            }
        }
        if level.is_rtl() || base_level.is_rtl() { BidiClass::R } else { BidiClass::L }
    }

    fn find_strong_after(classes: &[BidiClass], levels: &[Level], pos: usize, base_level: Level) -> BidiClass {
        let level = levels[pos];
        for i in (pos + 1)..classes.len() {
            if levels[i] != level {
                break;
            }
            match classes[i] {
                BidiClass::L => return BidiClass::L,
                BidiClass::R | BidiClass::AN | BidiClass::EN => return BidiClass::R,
                _ => {}
            }
        }
        if level.is_rtl() || base_level.is_rtl() { BidiClass::R } else { BidiClass::L }
    }

    fn resolve_implicit(levels: &mut [Level], classes: &[BidiClass]) {
        for i in 0..levels.len() {
            let level = levels[i];
            if level.is_rtl() {
                if matches!(classes[i], BidiClass::L | BidiClass::EN | BidiClass::AN) {
                    levels[i] = Level(level.0 + 1);
                }
            } else {
                match classes[i] {
                    BidiClass::R => levels[i] = Level(level.0 + 1),
                    BidiClass::AN | BidiClass::EN => levels[i] = Level(level.0 + 2),
                    _ => {}
                }
            }
        }
    }

    fn reset_whitespace(levels: &mut [Level], original_classes: &[BidiClass], base_level: Level) {
        let mut reset_from = None;
        for i in (0..levels.len()).rev() {
            match original_classes[i] {
                BidiClass::WS | BidiClass::FSI | BidiClass::LRI | BidiClass::RLI | BidiClass::PDI => {
                    reset_from = Some(i);
                }
                BidiClass::S | BidiClass::B => {
                    levels[i] = base_level;
                    reset_from = Some(i);
                }
                c if !c.is_explicit() && c != BidiClass::BN => break,
                _ => {}
            }
        }
        if let Some(from) = reset_from {
            for level in &mut levels[from..] {
                *level = base_level;
            }
        }
    }

    /// Contiguous runs of equal embedding level, in logical order.
    pub fn runs(&self) -> Vec<BidiRun> {
        if self.levels.is_empty() {
            return Vec::new();
        }
        let mut runs = Vec::new();
        let mut start = 0;
        for i in 1..self.levels.len() {
            if self.levels[i] != self.levels[start] {
                runs.push(BidiRun { start, end: i, level: self.levels[start] });
                start = i;
            }
        }
        runs.push(BidiRun { start, end: self.levels.len(), level: self.levels[start] });
        runs
    }

    /// L2: reverses runs at each level from the paragraph's max level down
    /// to (but not including) the base level.
    pub fn visual_runs(&self) -> Vec<BidiRun> {
        let mut runs = self.runs();
        if runs.is_empty() {
            return runs;
        }
        let max_level = runs.iter().map(|r| r.level.0).max().unwrap_or(0);
        for level in (self.base_level.0..=max_level).rev() {
            let mut i = 0;
            while i < runs.len() {
                if runs[i].level.0 >= level {
                    let start = i;
                    while i < runs.len() && runs[i].level.0 >= level {
                        i += 1;
                    }
                    runs[start..i].reverse();
                } else {
                    i += 1;
                }
            }
        }
        runs
    }

    /// Logical-index permutation for final visual (LTR-read) glyph order.
    pub fn visual_indices(&self) -> Vec<usize> {
        let mut indices = Vec::with_capacity(self.levels.len());
        for run in self.visual_runs() {
            if run.level.is_rtl() {
                indices.extend((run.start..run.end).rev());
            } else {
                indices.extend(run.start..run.end);
            }
        }
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin_text_is_ltr() {
        let cps: Vec<u32> = "Hello World".chars().map(|c| c as u32).collect();
        let para = BidiParagraph::new(&cps, None);
        assert!(para.base_level.is_ltr());
        assert!(para.levels.iter().all(|l| l.is_ltr()));
    }

    #[test]
    fn hebrew_text_auto_detects_rtl_base() {
        let cps: Vec<u32> = "שלום".chars().map(|c| c as u32).collect();
        let para = BidiParagraph::new(&cps, None);
        assert!(para.base_level.is_rtl());
    }

    #[test]
    fn mixed_run_reverses_only_the_rtl_segment() {
        let cps: Vec<u32> = "Hello \u{0645}\u{0631}\u{062D}\u{0628}\u{0627} World".chars().map(|c| c as u32).collect();
        let para = BidiParagraph::new(&cps, None);
        assert!(para.base_level.is_ltr());
        let runs = para.runs();
        assert!(runs.len() >= 3);
        assert!(runs.iter().any(|r| r.level.is_rtl()));
    }
}
