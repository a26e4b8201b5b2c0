//! End-to-end flows over the public DAO surface

use chrono::NaiveDate;
use library_store::{
    models::{Book, Borrowing, Copy, CopyStatus, Librarian, Publisher, User},
    AppError, Dao, PersistenceContext, Repository,
};

fn repo() -> Repository {
    Repository::new(PersistenceContext::in_memory())
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn lend_and_return_a_copy() {
    let repo = repo();

    let mut publisher = Publisher::new("Tor", Some("New York".into()), None);
    repo.publishers.create(&mut publisher).await.unwrap();

    let mut b1 = Book::new("The Left Hand of Darkness", "Ursula K. Le Guin", 1969, "9780441478125");
    publisher.add_book(&mut b1).unwrap();
    repo.books.create(&mut b1).await.unwrap();

    let mut c1 = Copy::of(&b1).unwrap();
    let mut c2 = Copy::of(&b1).unwrap();
    repo.copies.create(&mut c1).await.unwrap();
    repo.copies.create(&mut c2).await.unwrap();

    let mut user = User::new("Uma", "uma@example.com", None, None);
    repo.users.create(&mut user).await.unwrap();

    let borrowing = repo
        .borrowings
        .borrow_copy(user.id.unwrap(), c1.id.unwrap(), date(2024, 2, 1))
        .await
        .unwrap();
    assert!(borrowing.is_open());
    let c1_stored = repo.copies.find_by_id(c1.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(c1_stored.status, CopyStatus::Borrowed);

    let available = repo.books.find_available_titles().await.unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].id, b1.id);
    assert_eq!(available[0].available_copies(), 1);

    let returned = repo.borrowings.return_copy(c1.id.unwrap()).await.unwrap();
    assert_eq!(returned.return_date, Some(chrono::Local::now().date_naive()));
    let c1_stored = repo.copies.find_by_id(c1.id.unwrap()).await.unwrap().unwrap();
    assert!(c1_stored.is_available());

    let history = repo.users.find_by_id(user.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(history.borrowings(), &[returned]);

    let err = repo.publishers.delete(publisher.id.unwrap()).await.unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));
    assert!(repo.publishers.find_by_id(publisher.id.unwrap()).await.unwrap().is_some());
}

#[tokio::test]
async fn only_titles_with_an_available_copy_are_listed() {
    let repo = repo();
    let mut a = Book::new("A", "Author A", 2001, "isbn-a");
    let mut b = Book::new("B", "Author B", 2002, "isbn-b");
    repo.books.create(&mut a).await.unwrap();
    repo.books.create(&mut b).await.unwrap();

    let mut free = Copy::of(&a).unwrap();
    let mut lent = Copy::of(&a).unwrap();
    repo.copies.create(&mut free).await.unwrap();
    repo.copies.create(&mut lent).await.unwrap();

    let mut user = User::new("Reader", "reader@example.com", None, None);
    repo.users.create(&mut user).await.unwrap();
    repo.borrowings
        .borrow_copy(user.id.unwrap(), lent.id.unwrap(), date(2024, 1, 1))
        .await
        .unwrap();

    let available = repo.books.find_available_titles().await.unwrap();
    let ids: Vec<_> = available.iter().map(|book| book.id).collect();
    assert_eq!(ids, vec![a.id]);
}

#[tokio::test]
async fn every_entity_round_trips() {
    let repo = repo();

    let mut publisher = Publisher::new("Orbit", Some("London".into()), Some("+44 20".into()));
    repo.publishers.create(&mut publisher).await.unwrap();
    let stored = repo.publishers.find_by_id(publisher.id.unwrap()).await.unwrap();
    assert_eq!(stored, Some(publisher.clone()));

    let mut book = Book::new("Ancillary Justice", "Ann Leckie", 2013, "9780316246620");
    publisher.add_book(&mut book).unwrap();
    repo.books.create(&mut book).await.unwrap();
    assert_eq!(repo.books.find_by_id(book.id.unwrap()).await.unwrap(), Some(book.clone()));

    let mut copy = Copy::of(&book).unwrap();
    repo.copies.create(&mut copy).await.unwrap();
    assert_eq!(repo.copies.find_by_id(copy.id.unwrap()).await.unwrap(), Some(copy.clone()));

    let mut user = User::new("Ivy", "ivy@example.com", Some("555-0199".into()), None);
    repo.users.create(&mut user).await.unwrap();
    assert_eq!(repo.users.find_by_id(user.id.unwrap()).await.unwrap(), Some(user.clone()));

    let mut librarian = Librarian::new(user.id.unwrap(), date(2018, 5, 14), "Reference");
    repo.librarians.create(&mut librarian).await.unwrap();
    assert_eq!(
        repo.librarians.find_by_id(librarian.id.unwrap()).await.unwrap(),
        Some(librarian.clone())
    );

    let mut borrowing = Borrowing::new(user.id.unwrap(), copy.id.unwrap(), date(2024, 4, 2));
    borrowing.return_date = Some(date(2024, 4, 20));
    repo.borrowings.create(&mut borrowing).await.unwrap();
    assert_eq!(
        repo.borrowings.find_by_id(borrowing.id.unwrap()).await.unwrap(),
        Some(borrowing.clone())
    );
    // a returned borrowing does not take the copy out of circulation
    let copy_now = repo.copies.find_by_id(copy.id.unwrap()).await.unwrap().unwrap();
    assert!(copy_now.is_available());

    user.address = Some("7 Elm Row".into());
    repo.users.update(&user).await.unwrap();
    let stored = repo.users.find_by_email("ivy@example.com").await.unwrap().unwrap();
    assert_eq!(stored.address.as_deref(), Some("7 Elm Row"));
    assert_eq!(stored.borrowings(), &[borrowing.clone()]);

    repo.borrowings.delete(borrowing.id.unwrap()).await.unwrap();
    repo.librarians.delete(librarian.id.unwrap()).await.unwrap();
    repo.users.delete(user.id.unwrap()).await.unwrap();
    repo.copies.delete(copy.id.unwrap()).await.unwrap();
    repo.books.delete(book.id.unwrap()).await.unwrap();
    repo.publishers.delete(publisher.id.unwrap()).await.unwrap();

    assert!(repo.publishers.find_all().await.unwrap().is_empty());
    assert!(repo.books.find_all().await.unwrap().is_empty());
    assert!(repo.copies.find_all().await.unwrap().is_empty());
    assert!(repo.users.find_all().await.unwrap().is_empty());
    assert!(repo.librarians.find_all().await.unwrap().is_empty());
    assert!(repo.borrowings.find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_writes_leave_no_trace() {
    let repo = repo();
    let mut book = Book::new("Neuromancer", "William Gibson", 1984, "9780441569595");
    repo.books.create(&mut book).await.unwrap();
    let mut copy = Copy::of(&book).unwrap();
    repo.copies.create(&mut copy).await.unwrap();

    let mut duplicate = Book::new("Neuromancer (2nd)", "William Gibson", 2000, "9780441569595");
    let err = repo.books.create(&mut duplicate).await.unwrap_err();
    assert!(matches!(err, AppError::Constraint(_)));
    assert!(duplicate.id.is_none());

    let mut orphan = Borrowing::new(12_345, copy.id.unwrap(), date(2024, 3, 3));
    let err = repo.borrowings.create(&mut orphan).await.unwrap_err();
    assert!(matches!(err, AppError::Constraint(_)));
    assert!(orphan.id.is_none());

    assert_eq!(repo.books.find_all().await.unwrap().len(), 1);
    assert!(repo.borrowings.find_all().await.unwrap().is_empty());
    let copy_now = repo.copies.find_by_id(copy.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(copy_now.status, CopyStatus::Available);
}

#[tokio::test]
async fn second_return_is_refused() {
    let repo = repo();
    let mut book = Book::new("Piranesi", "Susanna Clarke", 2020, "9781635575637");
    repo.books.create(&mut book).await.unwrap();
    let mut copy = Copy::of(&book).unwrap();
    repo.copies.create(&mut copy).await.unwrap();
    let mut user = User::new("Theo", "theo@example.com", None, None);
    repo.users.create(&mut user).await.unwrap();

    repo.borrowings
        .borrow_title(user.id.unwrap(), book.id.unwrap(), date(2024, 7, 1))
        .await
        .unwrap();
    let first = repo
        .borrowings
        .return_copy_on(copy.id.unwrap(), date(2024, 7, 9))
        .await
        .unwrap();

    let err = repo.borrowings.return_copy(copy.id.unwrap()).await.unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    let stored = repo.borrowings.find_by_id(first.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.return_date, Some(date(2024, 7, 9)));
}

#[tokio::test]
async fn closed_context_refuses_work() {
    let context = PersistenceContext::in_memory();
    let repo = Repository::new(context.clone());
    repo.users
        .create(&mut User::new("Zed", "zed@example.com", None, None))
        .await
        .unwrap();

    context.close().await;
    context.close().await;

    assert!(matches!(repo.users.find_all().await, Err(AppError::ContextClosed)));
}

#[tokio::test]
async fn entities_serialize_with_loaded_collections() {
    let repo = repo();
    let mut book = Book::new("Gideon the Ninth", "Tamsyn Muir", 2019, "9781250313188");
    repo.books.create(&mut book).await.unwrap();
    repo.copies.create(&mut Copy::of(&book).unwrap()).await.unwrap();

    let loaded = repo.books.find_by_id(book.id.unwrap()).await.unwrap().unwrap();
    let json = serde_json::to_value(&loaded).unwrap();
    assert_eq!(json["isbn"], "9781250313188");
    assert_eq!(json["copies"][0]["status"], "Available");

    let back: Book = serde_json::from_value(json).unwrap();
    assert_eq!(back, loaded);
}
