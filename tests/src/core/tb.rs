use ppujit_core::tb::*;

#[test]
fn tb_new() {
    let tb = TranslationBlock::new(0x1000);
    assert_eq!(tb.pc, 0x1000);
    assert_eq!(tb.size, 0);
    assert_eq!(tb.icount, 0);
    assert_eq!(tb.fallbacks, 0);
    assert_eq!(tb.revision, 0);
}

#[test]
fn tb_overlaps() {
    let mut tb = TranslationBlock::new(0x1000);
    tb.size = 0x20;
    assert_eq!(tb.end(), 0x1020);
    assert!(tb.overlaps(0x1000, 4));
    assert!(tb.overlaps(0x101C, 4));
    assert!(tb.overlaps(0x0FFC, 8));
    assert!(!tb.overlaps(0x1020, 4));
    assert!(!tb.overlaps(0x0FFC, 4));
}

#[test]
fn tb_overlaps_top_of_address_space() {
    let mut tb = TranslationBlock::new(0xFFFF_FFF0);
    tb.size = 0x10;
    assert!(tb.overlaps(0xFFFF_FFFC, 4));
    assert!(!tb.overlaps(0, 4));
}

#[test]
fn exit_codes_distinct() {
    assert_ne!(EXIT_RETURN, EXIT_BLOCK_ENDED);
    assert_ne!(EXIT_RETURN, EXIT_HALT);
    assert_ne!(EXIT_BLOCK_ENDED, EXIT_HALT);
}

#[test]
fn jump_cache_insert_lookup() {
    let mut jc: JumpCache<u32> = JumpCache::new();
    assert_eq!(jc.lookup(0x1000), None);
    jc.insert(0x1000, 7);
    assert_eq!(jc.lookup(0x1000), Some(&7));
}

#[test]
fn jump_cache_collision_is_miss() {
    let mut jc: JumpCache<u32> = JumpCache::new();
    let a = 0x1000;
    let b = a + (TB_JMP_CACHE_SIZE as u32) * 4;
    jc.insert(a, 1);
    assert_eq!(jc.lookup(b), None);
    jc.insert(b, 2);
    assert_eq!(jc.lookup(a), None);
    assert_eq!(jc.lookup(b), Some(&2));
}

#[test]
fn jump_cache_remove_only_matching_tag() {
    let mut jc: JumpCache<u32> = JumpCache::new();
    let a = 0x2000;
    let b = a + (TB_JMP_CACHE_SIZE as u32) * 4;
    jc.insert(a, 1);
    jc.remove(b);
    assert_eq!(jc.lookup(a), Some(&1));
    jc.remove(a);
    assert_eq!(jc.lookup(a), None);
}

#[test]
fn jump_cache_invalidate() {
    let mut jc: JumpCache<u32> = JumpCache::new();
    for i in 0..16u32 {
        jc.insert(0x1000 + i * 4, i);
    }
    jc.invalidate();
    for i in 0..16u32 {
        assert_eq!(jc.lookup(0x1000 + i * 4), None);
    }
}
