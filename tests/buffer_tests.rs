use minibase::storage::PagedFileStore;
use minibase::{BufferManager, MinibaseError, PageId, Result};

fn buffer_with_capacity(capacity: usize) -> BufferManager {
    let store = PagedFileStore::in_memory(256).unwrap();
    BufferManager::new(store, capacity)
}

#[test]
fn test_buffer_manager_basic() -> Result<()> {
    let mut buffer = buffer_with_capacity(2);

    let page1 = PageId(1);
    let page2 = PageId(2);
    buffer.fix(page1)?;
    buffer.fix(page2)?;
    assert_eq!(buffer.page(page1).unwrap().fix_count(), 1);

    // Both pages pinned - fixing a third must fail
    let page3 = PageId(3);
    assert!(matches!(buffer.fix(page3), Err(MinibaseError::BufferFull)));

    // Unpin one and the third page fits
    buffer.unfix(page1)?;
    buffer.fix(page3)?;

    Ok(())
}

#[test]
fn test_buffer_manager_dirty_pages() -> Result<()> {
    let mut buffer = buffer_with_capacity(4);

    let page1 = PageId(1);
    let page = buffer.fix(page1)?;
    page.data_mut()[0] = 42;
    buffer.mark_dirty(page1)?;
    buffer.unfix(page1)?;

    buffer.force(page1)?;
    assert!(!buffer.page(page1).unwrap().is_dirty());

    // Evict and reload: the byte must have reached the store
    buffer.evict(page1)?;
    let page = buffer.fix(page1)?;
    assert_eq!(page.data()[0], 42);
    buffer.unfix(page1)?;

    Ok(())
}

#[test]
fn test_eviction_writes_dirty_pages_first() -> Result<()> {
    let mut buffer = buffer_with_capacity(4);

    let page1 = PageId(1);
    let page = buffer.fix(page1)?;
    page.data_mut()[10] = 7;
    buffer.mark_dirty(page1)?;
    buffer.unfix(page1)?;

    // Explicit evict of a dirty non-transactional page writes it out
    buffer.evict(page1)?;
    assert!(buffer.page(page1).is_none());

    let page = buffer.fix(page1)?;
    assert_eq!(page.data()[10], 7);
    buffer.unfix(page1)?;

    Ok(())
}

#[test]
fn test_transactional_pages_are_not_auto_evicted() -> Result<()> {
    let mut buffer = buffer_with_capacity(1);

    let page1 = PageId(1);
    buffer.fix(page1)?;
    buffer.mark_dirty(page1)?;
    buffer.mark_transactional(page1)?;
    buffer.unfix(page1)?;

    // The only page is unpinned but transactional, so there is no victim
    assert!(matches!(
        buffer.fix(PageId(2)),
        Err(MinibaseError::BufferFull)
    ));

    Ok(())
}

#[test]
fn test_evict_refuses_fixed_pages() -> Result<()> {
    let mut buffer = buffer_with_capacity(4);

    let page1 = PageId(1);
    buffer.fix(page1)?;
    assert!(buffer.evict(page1).is_err());

    buffer.unfix(page1)?;
    buffer.evict(page1)?;

    Ok(())
}

#[test]
fn test_unfix_of_unfixed_page_is_an_error() -> Result<()> {
    let mut buffer = buffer_with_capacity(4);

    let page1 = PageId(1);
    buffer.fix(page1)?;
    buffer.unfix(page1)?;
    assert!(matches!(
        buffer.unfix(page1),
        Err(MinibaseError::InvariantViolation(_))
    ));

    Ok(())
}

#[test]
fn test_restore_page_marks_page_clean() -> Result<()> {
    let mut buffer = buffer_with_capacity(4);

    let page1 = PageId(1);
    let snapshot = {
        let page = buffer.fix(page1)?;
        let snapshot = page.data().to_vec();
        page.data_mut()[0] = 99;
        snapshot
    };
    buffer.mark_dirty(page1)?;
    buffer.mark_transactional(page1)?;
    buffer.unfix(page1)?;

    assert!(buffer.restore_page(page1, &snapshot));
    let page = buffer.page(page1).unwrap();
    assert_eq!(page.data()[0], 0);
    assert!(!page.is_dirty());
    assert!(!page.is_transactional());

    Ok(())
}
